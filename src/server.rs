use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use thiserror::Error;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    aof::{AppendOnlyFile, CommandLog, DEFAULT_FLUSH_INTERVAL, spawn_flush_task},
    commands::{CommandDispatcher, CommandRegistry},
    connection::handle_client_connection,
    key_value_store::KeyValueStore,
    pub_sub::PubSub,
};

pub const DEFAULT_PORT: u32 = 6379;
pub const DEFAULT_APPEND_FILENAME: &str = "appendonly.aof";

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
}

#[derive(Debug)]
pub struct RedisServer {
    pub port: u32,
    pub dir: PathBuf,
    pub append_filename: String,
    pub flush_interval: Duration,
}

impl RedisServer {
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut port: Option<u32> = None;
        let mut dir: Option<PathBuf> = None;
        let mut append_filename: Option<String> = None;
        let mut flush_interval: Option<Duration> = None;

        while let Some(arg) = iter.next() {
            let Some(value) = iter.next() else {
                return match arg.as_str() {
                    "--port" | "--dir" | "--appendfilename" | "--flush-interval-ms" => {
                        Err(CliError::InvalidCommandLineFlagValue)
                    }
                    _ => Err(CliError::InvalidCommandLineFlag),
                };
            };

            match arg.as_str() {
                "--port" => {
                    let port_number = value
                        .parse::<u32>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

                    if !(1..=65535).contains(&port_number) {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    port = Some(port_number);
                }
                "--dir" => {
                    if value.is_empty() {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    dir = Some(PathBuf::from(value));
                }
                "--appendfilename" => {
                    if value.is_empty() || value.contains(|c: char| c == '/' || c == '\\') {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    append_filename = Some(value);
                }
                "--flush-interval-ms" => {
                    let millis = value
                        .parse::<u64>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

                    if millis == 0 {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    flush_interval = Some(Duration::from_millis(millis));
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(RedisServer {
            port: port.unwrap_or(DEFAULT_PORT),
            dir: dir.unwrap_or_else(|| PathBuf::from(".")),
            append_filename: append_filename
                .unwrap_or_else(|| DEFAULT_APPEND_FILENAME.to_string()),
            flush_interval: flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL),
        })
    }

    pub fn aof_path(&self) -> PathBuf {
        self.dir.join(&self.append_filename)
    }

    /// Binds the listener and serves clients until Ctrl-C.
    pub async fn run(self) -> anyhow::Result<()> {
        let address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Restores the store from the append-only file, then accepts connections on
    /// `listener` until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let aof_path = self.aof_path();
        let aof = Arc::new(
            AppendOnlyFile::open(&aof_path)
                .await
                .with_context(|| format!("failed to open {}", aof_path.display()))?,
        );

        let registry = Arc::new(CommandRegistry::default());
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        {
            let mut store_guard = store.lock().await;
            aof.replay(|command| {
                if let Err(e) = registry.replay(&mut store_guard, &command) {
                    warn!("skipping invalid command in append-only file: {}", e);
                }
            })
            .await
            .with_context(|| format!("failed to replay {}", aof_path.display()))?;
        }

        let log: Arc<dyn CommandLog> = aof;
        let flush_task = spawn_flush_task(Arc::clone(&log), self.flush_interval);

        let dispatcher = Arc::new(CommandDispatcher::new(
            store,
            Arc::clone(&log),
            registry,
        ));
        let pub_sub = Arc::new(PubSub::default());

        info!(
            "listening on {}",
            listener
                .local_addr()
                .map_or_else(|_| format!("port {}", self.port), |a| a.to_string())
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, address)) => {
                        debug!("accepted new connection from {}", address);
                        tokio::spawn(handle_client_connection(
                            stream,
                            address.to_string(),
                            Arc::clone(&dispatcher),
                            Arc::clone(&pub_sub),
                        ));
                    }
                    Err(e) => warn!("failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
            }
        }

        flush_task.abort();
        log.flush()
            .await
            .context("failed to flush append-only file on shutdown")?;

        Ok(())
    }
}
