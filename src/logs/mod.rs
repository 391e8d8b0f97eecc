//! Live log streaming: one follow process per subscription, multiplexed over
//! a single client connection.
//!
//! Each connection owns its own [`LogSession`]; closing a connection only
//! tears down the follows that connection started. Process output reaches
//! the session through a bounded channel, so a slow client stalls the
//! readers instead of growing a buffer.

pub mod protocol;
pub mod server;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::LogStreamSettings;
use crate::driver::{ClusterDriver, LogProcess};
use crate::error::Result;

use self::protocol::{stream_id, ClientMessage, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Stdout,
    Stderr,
}

#[derive(Debug)]
enum SessionEvent {
    Output {
        stream_id: String,
        generation: u64,
        kind: OutputKind,
        data: String,
    },
    Exited {
        stream_id: String,
        generation: u64,
    },
}

/// A registered follow. Dropping it (or its cancel sender) stops the pump,
/// which kills the process.
struct Subscription {
    generation: u64,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stops the pump and waits until its process has been killed.
    async fn terminate(self) {
        let _ = self.cancel.send(());
        if let Err(e) = self.task.await {
            log::warn!("logs: follow task ended abnormally: {e}");
        }
    }
}

pub struct LogSession {
    connection_id: u64,
    driver: Arc<dyn ClusterDriver>,
    settings: LogStreamSettings,
    subscriptions: HashMap<String, Subscription>,
    next_generation: u64,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl LogSession {
    pub fn new(
        connection_id: u64,
        driver: Arc<dyn ClusterDriver>,
        settings: LogStreamSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(settings.channel_capacity.max(1));
        Self {
            connection_id,
            driver,
            settings,
            subscriptions: HashMap::new(),
            next_generation: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn is_streaming(&self, stream_id: &str) -> bool {
        self.subscriptions.contains_key(stream_id)
    }

    pub fn active_streams(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.subscriptions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Starts following a pod's logs. An existing follow with the same stream
    /// id is killed first. Returns the stream id.
    pub async fn subscribe(
        &mut self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
    ) -> Result<String> {
        let container = container.filter(|c| !c.is_empty());
        let id = stream_id(namespace, pod, container);

        if let Some(previous) = self.subscriptions.remove(&id) {
            log::info!("logs[{}]: replacing stream {id}", self.connection_id);
            previous.terminate().await;
        }

        let process = self
            .driver
            .follow_pod_logs(namespace, pod, container, self.settings.tail_lines)
            .await?;

        self.next_generation += 1;
        let generation = self.next_generation;
        let (cancel, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(pump(
            id.clone(),
            generation,
            process,
            self.events_tx.clone(),
            cancel_rx,
            self.settings.chunk_size.max(1),
        ));

        self.subscriptions.insert(
            id.clone(),
            Subscription {
                generation,
                cancel,
                task,
            },
        );
        log::info!("logs[{}]: streaming {id}", self.connection_id);
        Ok(id)
    }

    /// Kills the follow for `stream_id`. Nothing further is emitted for it.
    /// Returns false if no such stream was active.
    pub async fn unsubscribe(&mut self, stream_id: &str) -> bool {
        match self.subscriptions.remove(stream_id) {
            Some(subscription) => {
                subscription.terminate().await;
                log::info!("logs[{}]: unsubscribed {stream_id}", self.connection_id);
                true
            }
            None => false,
        }
    }

    /// Applies a client message, returning an error reply if it failed.
    pub async fn handle(&mut self, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::SubscribeLogs {
                namespace,
                pod,
                container,
            } => match self.subscribe(&namespace, &pod, container.as_deref()).await {
                Ok(_) => None,
                Err(e) => {
                    log::warn!(
                        "logs[{}]: cannot follow {namespace}/{pod}: {e}",
                        self.connection_id
                    );
                    Some(ServerMessage::Error {
                        data: format!("failed to start log stream: {e}"),
                        stream_id: Some(stream_id(
                            &namespace,
                            &pod,
                            container.as_deref().filter(|c| !c.is_empty()),
                        )),
                    })
                }
            },
            ClientMessage::UnsubscribeLogs { stream_id } => {
                self.unsubscribe(&stream_id).await;
                None
            }
        }
    }

    /// Parses and applies a raw text frame.
    pub async fn handle_text(&mut self, text: &str) -> Option<ServerMessage> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => Some(ServerMessage::Error {
                data: format!("invalid message: {e}"),
                stream_id: None,
            }),
        }
    }

    /// Waits for the next message to push to the client. Output of streams
    /// that were replaced or unsubscribed in the meantime is dropped.
    ///
    /// Cancel safe.
    pub async fn next_message(&mut self) -> Option<ServerMessage> {
        loop {
            match self.events_rx.recv().await? {
                SessionEvent::Output {
                    stream_id,
                    generation,
                    kind,
                    data,
                } => {
                    if !self.is_current(&stream_id, generation) {
                        continue;
                    }
                    return Some(match kind {
                        OutputKind::Stdout => ServerMessage::Log { data, stream_id },
                        OutputKind::Stderr => ServerMessage::Error {
                            data,
                            stream_id: Some(stream_id),
                        },
                    });
                }
                SessionEvent::Exited {
                    stream_id,
                    generation,
                } => {
                    if !self.is_current(&stream_id, generation) {
                        continue;
                    }
                    self.subscriptions.remove(&stream_id);
                    log::info!("logs[{}]: stream {stream_id} closed", self.connection_id);
                    return Some(ServerMessage::StreamClosed { stream_id });
                }
            }
        }
    }

    /// Kills every follow owned by this session.
    pub async fn close(mut self) {
        let count = self.subscriptions.len();
        for (_, subscription) in self.subscriptions.drain() {
            subscription.terminate().await;
        }
        if count > 0 {
            log::info!(
                "logs[{}]: stopped {count} stream(s) on disconnect",
                self.connection_id
            );
        }
    }

    fn is_current(&self, stream_id: &str, generation: u64) -> bool {
        self.subscriptions
            .get(stream_id)
            .is_some_and(|s| s.generation == generation)
    }
}

/// Copies a follow process's output into the session channel until the
/// process exits or the subscription is cancelled.
async fn pump(
    stream_id: String,
    generation: u64,
    mut process: LogProcess,
    events: mpsc::Sender<SessionEvent>,
    mut cancel: oneshot::Receiver<()>,
    chunk_size: usize,
) {
    let mut out_buf = vec![0u8; chunk_size];
    let mut err_buf = vec![0u8; chunk_size];
    let mut out_text = Utf8Chunks::default();
    let mut err_text = Utf8Chunks::default();
    let mut stdout_open = true;
    let mut stderr_open = true;

    while stdout_open || stderr_open {
        let (kind, read) = tokio::select! {
            _ = &mut cancel => return stop(&stream_id, &mut process).await,
            read = process.stdout.read(&mut out_buf), if stdout_open => (OutputKind::Stdout, read),
            read = process.stderr.read(&mut err_buf), if stderr_open => (OutputKind::Stderr, read),
        };

        let (text, buf, open) = match kind {
            OutputKind::Stdout => (&mut out_text, &out_buf, &mut stdout_open),
            OutputKind::Stderr => (&mut err_text, &err_buf, &mut stderr_open),
        };
        let data = match read {
            Ok(0) => {
                *open = false;
                text.finish()
            }
            Ok(n) => text.push(&buf[..n]),
            Err(e) => {
                log::debug!("logs: read error on {stream_id}: {e}");
                *open = false;
                text.finish()
            }
        };
        if data.is_empty() {
            continue;
        }

        let event = SessionEvent::Output {
            stream_id: stream_id.clone(),
            generation,
            kind,
            data,
        };
        if !forward(&events, &mut cancel, event).await {
            return stop(&stream_id, &mut process).await;
        }
    }

    let status = tokio::select! {
        _ = &mut cancel => return stop(&stream_id, &mut process).await,
        status = process.handle.wait() => status,
    };
    log::debug!("logs: follow for {stream_id} exited: {status:?}");

    let exited = SessionEvent::Exited {
        stream_id: stream_id.clone(),
        generation,
    };
    forward(&events, &mut cancel, exited).await;
}

/// Sends `event` unless the subscription is cancelled first. Returns false
/// when the pump should stop.
async fn forward(
    events: &mpsc::Sender<SessionEvent>,
    cancel: &mut oneshot::Receiver<()>,
    event: SessionEvent,
) -> bool {
    tokio::select! {
        _ = cancel => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

async fn stop(stream_id: &str, process: &mut LogProcess) {
    if let Err(e) = process.handle.kill().await {
        log::debug!("logs: killing follow for {stream_id} failed: {e}");
    }
}

/// Decodes pipe reads as UTF-8 without splitting a character across two
/// messages. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    /// Returns the text of every complete character read so far, holding back
    /// an unfinished trailing sequence.
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let keep = incomplete_tail(&self.pending);
        let rest = self.pending.split_off(self.pending.len() - keep);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    /// Flushes whatever is held back, at end of stream.
    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`, or 0.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}
