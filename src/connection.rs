use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::{RwLock, mpsc},
};
use tracing::{debug, warn};

use crate::{
    commands::{CommandDispatcher, CommandError, split_command},
    input::{CommandReadError, RespReader},
    pub_sub::{PUBLISH, PubSub, SUBSCRIBE, SubscriptionId, UNSUBSCRIBE, is_pub_sub_command},
    resp::RespValue,
};

type SharedWriter<W> = Arc<RwLock<W>>;

enum Request<'a> {
    Pipeline(&'a [RespValue]),
    PubSub(String, &'a [RespValue]),
    Single,
}

impl<'a> Request<'a> {
    fn classify(value: &'a RespValue) -> Self {
        if let RespValue::Array(elements) = value {
            if let Some(RespValue::Array(_)) = elements.first() {
                return Request::Pipeline(elements);
            }
        }

        match split_command(value) {
            Ok((name, arguments)) if is_pub_sub_command(&name) => Request::PubSub(name, arguments),
            _ => Request::Single,
        }
    }
}

pub async fn handle_client_connection(
    stream: TcpStream,
    client_address: String,
    dispatcher: Arc<CommandDispatcher>,
    pub_sub: Arc<PubSub>,
) {
    let (reader, writer) = stream.into_split();
    serve_connection(reader, writer, &client_address, dispatcher, pub_sub).await;
}

/// Serves one client until it disconnects, then drops all of its subscriptions.
pub async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    client_address: &str,
    dispatcher: Arc<CommandDispatcher>,
    pub_sub: Arc<PubSub>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    debug!("client {} connected", client_address);

    let mut reader = RespReader::new(reader);
    let writer = Arc::new(RwLock::new(writer));
    let mut subscriptions: HashMap<Bytes, SubscriptionId> = HashMap::new();

    loop {
        let request = match reader.read_value().await {
            Ok(value) => value,
            Err(CommandReadError::Protocol(e)) => {
                debug!("protocol error from client {}: {}", client_address, e);
                let reply = CommandReadError::Protocol(e).as_resp();
                if let Err(e) = thread_safe_write_to_stream(&writer, &reply).await {
                    warn!("error writing to client {}: {}", client_address, e);
                    break;
                }
                continue;
            }
            Err(CommandReadError::EndOfStream) => break,
            Err(e) => {
                debug!("closing connection to {}: {}", client_address, e);
                break;
            }
        };

        let reply = match Request::classify(&request) {
            Request::Pipeline(commands) => Some(dispatcher.execute_pipeline(commands).await),
            Request::PubSub(name, arguments) => {
                let outcome =
                    handle_pub_sub_command(&name, arguments, &pub_sub, &writer, &mut subscriptions)
                        .await;

                match outcome {
                    Ok(reply) => reply,
                    Err(PubSubFailure::Command(e)) => Some(e.as_resp()),
                    Err(PubSubFailure::Write(e)) => {
                        warn!("error writing to client {}: {}", client_address, e);
                        break;
                    }
                }
            }
            Request::Single => Some(dispatcher.execute(&request).await),
        };

        if let Some(reply) = reply {
            if let Err(e) = thread_safe_write_to_stream(&writer, &reply).await {
                warn!("error writing to client {}: {}", client_address, e);
                break;
            }
        }
    }

    for (channel, id) in subscriptions {
        pub_sub.unsubscribe(&channel, id).await;
    }

    debug!("client {} disconnected", client_address);
}

enum PubSubFailure {
    Command(CommandError),
    Write(std::io::Error),
}

impl From<CommandError> for PubSubFailure {
    fn from(e: CommandError) -> Self {
        PubSubFailure::Command(e)
    }
}

impl From<std::io::Error> for PubSubFailure {
    fn from(e: std::io::Error) -> Self {
        PubSubFailure::Write(e)
    }
}

/// Runs SUBSCRIBE, UNSUBSCRIBE or PUBLISH.
///
/// Acknowledgements are written here, one frame per channel, so the returned reply
/// is only set for PUBLISH.
async fn handle_pub_sub_command<W>(
    name: &str,
    arguments: &[RespValue],
    pub_sub: &Arc<PubSub>,
    writer: &SharedWriter<W>,
    subscriptions: &mut HashMap<Bytes, SubscriptionId>,
) -> Result<Option<RespValue>, PubSubFailure>
where
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    match name {
        SUBSCRIBE => {
            for channel in channel_arguments(SUBSCRIBE, arguments)? {
                let receiver = if subscriptions.contains_key(&channel) {
                    None
                } else {
                    let (id, receiver) = pub_sub.subscribe(channel.clone()).await;
                    subscriptions.insert(channel.clone(), id);
                    Some(receiver)
                };

                // The ack goes out before the delivery task can write any message.
                write_acknowledgement(writer, "subscribe", &channel).await?;

                if let Some(receiver) = receiver {
                    tokio::spawn(deliver_messages(channel, receiver, Arc::clone(writer)));
                }
            }

            Ok(None)
        }
        UNSUBSCRIBE => {
            for channel in channel_arguments(UNSUBSCRIBE, arguments)? {
                if let Some(id) = subscriptions.remove(&channel) {
                    pub_sub.unsubscribe(&channel, id).await;
                }

                write_acknowledgement(writer, "unsubscribe", &channel).await?;
            }

            Ok(None)
        }
        PUBLISH => {
            if arguments.len() != 2 {
                return Err(CommandError::WrongNumberOfArguments(PUBLISH).into());
            }
            let channel = arguments[0]
                .as_bulk()
                .ok_or(CommandError::InvalidArgumentType(PUBLISH))?;
            let message = arguments[1]
                .as_bulk()
                .ok_or(CommandError::InvalidArgumentType(PUBLISH))?;

            let count = pub_sub
                .publish(channel, RespValue::BulkString(message.clone()))
                .await;

            Ok(Some(RespValue::Integer(count as i64)))
        }
        _ => Err(CommandError::UnknownCommand(name.to_string()).into()),
    }
}

fn channel_arguments(
    command: &'static str,
    arguments: &[RespValue],
) -> Result<Vec<Bytes>, CommandError> {
    if arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments(command));
    }

    arguments
        .iter()
        .map(|argument| {
            argument
                .as_bulk()
                .cloned()
                .ok_or(CommandError::InvalidArgumentType(command))
        })
        .collect()
}

async fn write_acknowledgement<W>(
    writer: &SharedWriter<W>,
    kind: &str,
    channel: &Bytes,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let ack = RespValue::Array(vec![
        RespValue::bulk(kind.to_string()),
        RespValue::BulkString(channel.clone()),
    ]);

    thread_safe_write_to_stream(writer, &ack).await
}

/// Forwards every message arriving on a subscription queue to the client as a
/// `["message", channel, payload]` frame. Returns once the queue is closed or the
/// client can no longer be written to.
pub async fn deliver_messages<W>(
    channel: Bytes,
    mut receiver: mpsc::Receiver<RespValue>,
    writer: SharedWriter<W>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = receiver.recv().await {
        let frame = RespValue::Array(vec![
            RespValue::bulk("message"),
            RespValue::BulkString(channel.clone()),
            payload,
        ]);

        if let Err(e) = thread_safe_write_to_stream(&writer, &frame).await {
            debug!(
                "stopping delivery on channel '{}': {}",
                String::from_utf8_lossy(&channel),
                e
            );
            return;
        }
    }
}

async fn thread_safe_write_to_stream<W>(
    writer: &SharedWriter<W>,
    response: &RespValue,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let encoded = response.encode();

    let mut writer_guard = writer.write().await;
    writer_guard.write_all(&encoded).await?;
    writer_guard.flush().await?;

    Ok(())
}
