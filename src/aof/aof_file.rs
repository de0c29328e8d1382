use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncSeekExt, AsyncWriteExt},
    sync::Mutex,
};
use tracing::{info, warn};

use crate::{
    input::{CommandReadError, RespReader},
    resp::{RespError, RespValue},
};

#[derive(Error, Debug)]
pub enum AofError {
    #[error("I/O error on append-only file: {0}")]
    Io(#[from] std::io::Error),
    #[error("append-only file is corrupt at byte {offset}: {source}")]
    Corrupt { offset: u64, source: RespError },
}

/// Durable record of the commands that changed the store.
#[async_trait]
pub trait CommandLog: Send + Sync {
    /// Appends one command. Either the whole encoded command reaches the file or,
    /// on error, none of it does.
    async fn append(&self, command: &RespValue) -> Result<(), AofError>;

    /// Forces everything appended so far onto stable storage.
    async fn flush(&self) -> Result<(), AofError>;
}

struct LogFile {
    file: File,
    /// Length of the file up to the end of the last complete record.
    length: u64,
}

/// Append-only file holding commands as back-to-back RESP arrays.
pub struct AppendOnlyFile {
    path: PathBuf,
    inner: Mutex<LogFile>,
}

impl AppendOnlyFile {
    /// Opens the log at `path`, creating it (and its directory) when missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AofError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;
        let length = file.metadata().await?.len();

        Ok(Self {
            path,
            inner: Mutex::new(LogFile { file, length }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every logged command from the start of the file, in order, passing each
    /// to `apply`. Returns the number of commands replayed.
    ///
    /// A record cut short by a crash at the end of the file is dropped and the file
    /// truncated to the last complete record. Malformed data anywhere else is an error.
    pub async fn replay<F>(&self, mut apply: F) -> Result<usize, AofError>
    where
        F: FnMut(RespValue),
    {
        let mut log = self.inner.lock().await;
        log.file.seek(SeekFrom::Start(0)).await?;

        let mut replayed = 0;
        let torn_tail_at = {
            let mut reader = RespReader::new(&mut log.file);

            loop {
                let offset = reader.consumed();

                match reader.read_value().await {
                    Ok(command) => {
                        apply(command);
                        replayed += 1;
                    }
                    Err(CommandReadError::EndOfStream) => break None,
                    Err(CommandReadError::Truncated) => break Some(offset),
                    Err(CommandReadError::Protocol(source)) => {
                        return Err(AofError::Corrupt { offset, source });
                    }
                    Err(CommandReadError::Io(e)) => {
                        return Err(AofError::Io(std::io::Error::other(e)));
                    }
                }
            }
        };

        if let Some(valid_length) = torn_tail_at {
            warn!(
                "append-only file {} ends with an incomplete record, truncating it to {} bytes",
                self.path.display(),
                valid_length
            );
            log.file.set_len(valid_length).await?;
        }

        log.length = log.file.seek(SeekFrom::End(0)).await?;
        info!(
            "replayed {} commands from append-only file {}",
            replayed,
            self.path.display()
        );

        Ok(replayed)
    }
}

#[async_trait]
impl CommandLog for AppendOnlyFile {
    async fn append(&self, command: &RespValue) -> Result<(), AofError> {
        let record = command.encode();
        let mut log = self.inner.lock().await;

        let written = async {
            log.file.write_all(&record).await?;
            log.file.flush().await
        }
        .await;

        if let Err(e) = written {
            // Cut off whatever part of the record made it to the file.
            let length = log.length;
            if let Err(truncate_error) = log.file.set_len(length).await {
                warn!(
                    "could not roll back partial append-only record: {}",
                    truncate_error
                );
            }
            return Err(e.into());
        }

        log.length += record.len() as u64;
        Ok(())
    }

    async fn flush(&self) -> Result<(), AofError> {
        let log = self.inner.lock().await;
        log.file.sync_data().await?;
        Ok(())
    }
}
