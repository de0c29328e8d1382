mod aof_file;
mod flush_task;

pub use aof_file::{AofError, AppendOnlyFile, CommandLog};
pub use flush_task::{DEFAULT_FLUSH_INTERVAL, spawn_flush_task};
