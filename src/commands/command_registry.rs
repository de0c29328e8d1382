use std::{collections::HashMap, fmt};

use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError, get::GetArguments, hget::HgetArguments,
        hset::HsetArguments, keys::KeysArguments, ping::PingArguments, set::SetArguments,
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Runs a command's arguments against the store and produces its reply.
pub type Handler = fn(&mut KeyValueStore, &[RespValue]) -> RespValue;

/// A command that operates on the key-value store.
///
/// `parse` must reject every malformed argument list before `execute` can run, so a
/// failed validation never leaves the store partially modified.
pub trait StoreCommand: Sized {
    const NAME: &'static str;
    /// Whether the command changes the store and must therefore be persisted.
    const MUTATING: bool;

    fn parse(arguments: &[RespValue]) -> Result<Self, CommandError>;

    fn execute(self, store: &mut KeyValueStore) -> RespValue;
}

/// Checks the argument count and returns the bulk string payloads in order.
pub fn bulk_arguments<'a>(
    command: &'static str,
    arguments: &'a [RespValue],
    expected: usize,
) -> Result<Vec<&'a Bytes>, CommandError> {
    if arguments.len() != expected {
        return Err(CommandError::WrongNumberOfArguments(command));
    }

    arguments
        .iter()
        .map(|argument| {
            argument
                .as_bulk()
                .ok_or(CommandError::InvalidArgumentType(command))
        })
        .collect()
}

fn run<C: StoreCommand>(store: &mut KeyValueStore, arguments: &[RespValue]) -> RespValue {
    match C::parse(arguments) {
        Ok(command) => command.execute(store),
        Err(e) => e.as_resp(),
    }
}

fn validate<C: StoreCommand>(arguments: &[RespValue]) -> Result<(), CommandError> {
    C::parse(arguments).map(|_| ())
}

#[derive(Clone, Copy)]
pub struct CommandEntry {
    pub name: &'static str,
    pub mutating: bool,
    handler: Handler,
    validator: fn(&[RespValue]) -> Result<(), CommandError>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("mutating", &self.mutating)
            .finish()
    }
}

impl CommandEntry {
    pub fn of<C: StoreCommand>() -> Self {
        Self {
            name: C::NAME,
            mutating: C::MUTATING,
            handler: run::<C>,
            validator: validate::<C>,
        }
    }

    pub fn call(&self, store: &mut KeyValueStore, arguments: &[RespValue]) -> RespValue {
        (self.handler)(store, arguments)
    }

    pub fn validate(&self, arguments: &[RespValue]) -> Result<(), CommandError> {
        (self.validator)(arguments)
    }
}

/// Splits a command array into its upper-cased name and its arguments.
pub fn split_command(command: &RespValue) -> Result<(String, &[RespValue]), CommandError> {
    let RespValue::Array(elements) = command else {
        return Err(CommandError::InvalidCommandFormat);
    };

    match elements.split_first() {
        Some((RespValue::BulkString(name), arguments)) => Ok((
            String::from_utf8_lossy(name).to_ascii_uppercase(),
            arguments,
        )),
        _ => Err(CommandError::InvalidCommandFormat),
    }
}

/// Immutable name → handler table, built once at startup.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandEntry>,
}

impl CommandRegistry {
    pub fn with_commands<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CommandEntry>,
    {
        Self {
            commands: entries.into_iter().map(|entry| (entry.name, entry)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    /// Applies one command read back from the append-only file.
    pub fn replay(
        &self,
        store: &mut KeyValueStore,
        command: &RespValue,
    ) -> Result<(), CommandError> {
        let (name, arguments) = split_command(command)?;
        let Some(entry) = self.get(&name) else {
            return Err(CommandError::UnknownCommand(name));
        };

        entry.validate(arguments)?;
        entry.call(store, arguments);

        Ok(())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_commands([
            CommandEntry::of::<SetArguments>(),
            CommandEntry::of::<GetArguments>(),
            CommandEntry::of::<HsetArguments>(),
            CommandEntry::of::<HgetArguments>(),
            CommandEntry::of::<PingArguments>(),
            CommandEntry::of::<KeysArguments>(),
        ])
    }
}
