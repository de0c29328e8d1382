use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        command_registry::{StoreCommand, bulk_arguments},
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Handles the SET command: `SET key value`, replying `+OK`.
#[derive(Debug, PartialEq)]
pub struct SetArguments {
    pub key: Bytes,
    pub value: Bytes,
}

impl StoreCommand for SetArguments {
    const NAME: &'static str = "SET";
    const MUTATING: bool = true;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError> {
        let arguments = bulk_arguments(Self::NAME, arguments, 2)?;

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
        })
    }

    fn execute(self, store: &mut KeyValueStore) -> RespValue {
        store.set(self.key, self.value);
        RespValue::simple("OK")
    }
}
