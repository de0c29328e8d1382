mod command_dispatcher;
mod command_error;
mod command_registry;
mod get;
mod hget;
mod hset;
mod keys;
mod ping;
mod set;

pub use command_dispatcher::CommandDispatcher;
pub use command_error::CommandError;
pub use command_registry::{
    CommandEntry, CommandRegistry, Handler, StoreCommand, bulk_arguments, split_command,
};
pub use get::GetArguments;
pub use hget::HgetArguments;
pub use hset::HsetArguments;
pub use keys::KeysArguments;
pub use ping::PingArguments;
pub use set::SetArguments;
