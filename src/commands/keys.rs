use crate::{
    commands::{
        command_error::CommandError,
        command_registry::{StoreCommand, bulk_arguments},
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Handles `KEYS`, listing every plain string key (hash keys are not included).
/// Takes no pattern argument.
pub struct KeysArguments;

impl StoreCommand for KeysArguments {
    const NAME: &'static str = "KEYS";
    const MUTATING: bool = false;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError> {
        bulk_arguments(Self::NAME, arguments, 0)?;
        Ok(Self)
    }

    fn execute(self, store: &mut KeyValueStore) -> RespValue {
        let mut keys: Vec<_> = store.keys().cloned().collect();
        keys.sort();

        RespValue::Array(keys.into_iter().map(RespValue::BulkString).collect())
    }
}
