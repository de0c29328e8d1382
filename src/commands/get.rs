use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        command_registry::{StoreCommand, bulk_arguments},
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Handles the Redis GET command.
///
/// Retrieves the value associated with a key from the key-value store.
///
/// # Returns
///
/// * Bulk string containing the value if the key exists
/// * Null if the key doesn't exist (hash keys are not visible to GET)
/// * An error reply if the number of arguments is not exactly 1 or the key is not
///   a bulk string
///
/// # Examples
///
/// ```ignore
/// // GET mykey
/// // Returns: "$5\r\nhello\r\n" or "$-1\r\n" (null)
/// ```
#[derive(Debug, PartialEq)]
pub struct GetArguments {
    pub key: Bytes,
}

impl StoreCommand for GetArguments {
    const NAME: &'static str = "GET";
    const MUTATING: bool = false;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError> {
        let arguments = bulk_arguments(Self::NAME, arguments, 1)?;

        Ok(Self {
            key: arguments[0].clone(),
        })
    }

    fn execute(self, store: &mut KeyValueStore) -> RespValue {
        match store.get(&self.key) {
            Some(value) => RespValue::BulkString(value.clone()),
            None => RespValue::Null,
        }
    }
}
