use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        command_registry::{StoreCommand, bulk_arguments},
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

#[derive(Debug, PartialEq)]
pub struct HgetArguments {
    pub key: Bytes,
    pub field: Bytes,
}

impl StoreCommand for HgetArguments {
    const NAME: &'static str = "HGET";
    const MUTATING: bool = false;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError> {
        let arguments = bulk_arguments(Self::NAME, arguments, 2)?;

        Ok(Self {
            key: arguments[0].clone(),
            field: arguments[1].clone(),
        })
    }

    /// Null when either the hash or the field is missing.
    fn execute(self, store: &mut KeyValueStore) -> RespValue {
        match store.hget(&self.key, &self.field) {
            Some(value) => RespValue::BulkString(value.clone()),
            None => RespValue::Null,
        }
    }
}
