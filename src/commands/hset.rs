use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        command_registry::{StoreCommand, bulk_arguments},
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Handles the HSET command: `HSET hash field value`.
///
/// The hash is created on first use. Replies `+OK` rather than the number of new
/// fields.
#[derive(Debug, PartialEq)]
pub struct HsetArguments {
    pub key: Bytes,
    pub field: Bytes,
    pub value: Bytes,
}

impl StoreCommand for HsetArguments {
    const NAME: &'static str = "HSET";
    const MUTATING: bool = true;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError> {
        let arguments = bulk_arguments(Self::NAME, arguments, 3)?;

        Ok(Self {
            key: arguments[0].clone(),
            field: arguments[1].clone(),
            value: arguments[2].clone(),
        })
    }

    fn execute(self, store: &mut KeyValueStore) -> RespValue {
        store.hset(self.key, self.field, self.value);
        RespValue::simple("OK")
    }
}
