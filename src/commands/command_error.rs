use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CommandError {
    #[error("invalid request format")]
    InvalidCommandFormat,
    #[error("invalid pipeline command format")]
    InvalidPipelineCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(&'static str),
    #[error("invalid argument for '{0}' command, expected a bulk string")]
    InvalidArgumentType(&'static str),
    #[error("'{0}' is not allowed inside a pipeline")]
    NotAllowedInPipeline(String),
    #[error("internal server error")]
    PersistenceFailed,
}

impl CommandError {
    /// The error reply sent back to the client.
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}
