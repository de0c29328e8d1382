use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        command_registry::{StoreCommand, bulk_arguments},
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

pub struct PingArguments {
    pub message: Option<Bytes>,
}

impl StoreCommand for PingArguments {
    const NAME: &'static str = "PING";
    const MUTATING: bool = false;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::WrongNumberOfArguments(Self::NAME));
        }

        let message = bulk_arguments(Self::NAME, arguments, arguments.len())?
            .first()
            .map(|message| (*message).clone());

        Ok(Self { message })
    }

    fn execute(self, _store: &mut KeyValueStore) -> RespValue {
        match self.message {
            Some(message) => RespValue::BulkString(message),
            None => RespValue::simple("PONG"),
        }
    }
}
