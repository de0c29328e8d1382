use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::error;

use crate::{
    aof::CommandLog,
    commands::{
        command_error::CommandError,
        command_registry::{CommandRegistry, split_command},
    },
    key_value_store::KeyValueStore,
    pub_sub::is_pub_sub_command,
    resp::RespValue,
};

/// Executes store commands on behalf of client connections.
///
/// Every command runs with the store lock held. Mutating commands are validated,
/// then appended to the command log, and only then applied, all under that same
/// lock, so the log records commands in exactly the order they changed the store.
pub struct CommandDispatcher {
    store: Arc<Mutex<KeyValueStore>>,
    log: Arc<dyn CommandLog>,
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<Mutex<KeyValueStore>>,
        log: Arc<dyn CommandLog>,
        registry: Arc<CommandRegistry>,
    ) -> Self {
        CommandDispatcher {
            store,
            log,
            registry,
        }
    }

    /// Runs a single command array and returns its reply.
    pub async fn execute(&self, command: &RespValue) -> RespValue {
        match self.try_execute(command).await {
            Ok(response) => response,
            Err(e) => e.as_resp(),
        }
    }

    /// Runs every command of a pipeline in order and collects the replies, one per
    /// slot. A failing slot does not stop the ones after it.
    pub async fn execute_pipeline(&self, commands: &[RespValue]) -> RespValue {
        let mut responses = Vec::with_capacity(commands.len());

        for command in commands {
            let response = match split_command(command) {
                Ok((name, _)) if is_pub_sub_command(&name) => {
                    CommandError::NotAllowedInPipeline(name).as_resp()
                }
                Ok(_) => self.execute(command).await,
                Err(_) => CommandError::InvalidPipelineCommand.as_resp(),
            };

            responses.push(response);
        }

        RespValue::Array(responses)
    }

    async fn try_execute(&self, command: &RespValue) -> Result<RespValue, CommandError> {
        let (name, arguments) = split_command(command)?;
        let Some(entry) = self.registry.get(&name) else {
            return Err(CommandError::UnknownCommand(name));
        };

        let mut store_guard = self.store.lock().await;

        if entry.mutating {
            entry.validate(arguments)?;

            if let Err(e) = self.log.append(command).await {
                error!("failed to persist {} command, store left unchanged: {}", name, e);
                return Err(CommandError::PersistenceFailed);
            }
        }

        Ok(entry.call(&mut store_guard, arguments))
    }
}
