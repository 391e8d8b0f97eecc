//! WebSocket endpoint for the log protocol.

use std::sync::Arc;

use futures::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::config::LogStreamSettings;
use crate::driver::ClusterDriver;
use crate::error::Result;

use super::protocol::ServerMessage;
use super::LogSession;

/// Accepts connections forever, one [`LogSession`] per connection.
pub async fn serve(
    listener: TcpListener,
    driver: Arc<dyn ClusterDriver>,
    settings: LogStreamSettings,
) -> Result<()> {
    log::info!("logs: listening on ws://{}", listener.local_addr()?);

    let mut next_connection_id: u64 = 0;
    loop {
        let (stream, peer) = listener.accept().await?;
        next_connection_id += 1;
        let connection_id = next_connection_id;
        let driver = driver.clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            log::debug!("logs[{connection_id}]: accepted {peer}");
            if let Err(e) = handle_connection(stream, connection_id, driver, settings).await {
                log::warn!("logs[{connection_id}]: connection from {peer} failed: {e}");
            }
        });
    }
}

enum Step {
    Incoming(Option<std::result::Result<Message, WsError>>),
    Outgoing(Option<ServerMessage>),
}

/// Runs the protocol on an accepted stream until the client goes away. All
/// follows started on this connection are killed before returning.
pub async fn handle_connection<S>(
    stream: S,
    connection_id: u64,
    driver: Arc<dyn ClusterDriver>,
    settings: LogStreamSettings,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let socket = tokio_tungstenite::accept_async(stream).await?;
    log::info!("logs[{connection_id}]: client connected");

    let (mut sink, mut source) = socket.split();
    let mut session = LogSession::new(connection_id, driver, settings);

    let outcome = loop {
        let step = tokio::select! {
            incoming = source.next() => Step::Incoming(incoming),
            outgoing = session.next_message() => Step::Outgoing(outgoing),
        };

        let sent = match step {
            Step::Incoming(Some(Ok(Message::Text(text)))) => {
                match session.handle_text(text.as_str()).await {
                    Some(reply) => send(&mut sink, &reply).await,
                    None => Ok(()),
                }
            }
            Step::Incoming(Some(Ok(Message::Close(_)))) | Step::Incoming(None) => break Ok(()),
            Step::Incoming(Some(Ok(_))) => Ok(()),
            Step::Incoming(Some(Err(WsError::ConnectionClosed))) => break Ok(()),
            Step::Incoming(Some(Err(e))) => break Err(e.into()),
            Step::Outgoing(Some(message)) => send(&mut sink, &message).await,
            Step::Outgoing(None) => break Ok(()),
        };
        if let Err(e) = sent {
            break Err(e);
        }
    };

    session.close().await;
    log::info!("logs[{connection_id}]: client disconnected");
    outcome
}

async fn send<S>(sink: &mut S, message: &ServerMessage) -> Result<()>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::text(text)).await?;
    Ok(())
}
