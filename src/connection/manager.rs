//! Client handle and the connection task that owns the session

use super::config::ClientConfig;
use super::session::Session;
use crate::delivery::SendOutcome;
use crate::error::ClientError;
use crate::handler::ClientHandler;
use crate::stats::MessageStats;
use crate::transport::{TransportConnector, TransportEnvelope, WebSocketConnector};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};
use yarrboard_shared::{Command, ConnectionState};

/// Requests from the handle to the connection task
#[derive(Debug)]
enum ClientCommand {
    Start,
    Close,
    Send {
        command: Command,
        require_confirmation: bool,
        reply: oneshot::Sender<Result<SendOutcome, ClientError>>,
    },
    Stats {
        reply: oneshot::Sender<MessageStats>,
    },
    Shutdown,
}

/// Handle to one board connection
///
/// All state lives in a background task; the handle only passes requests to
/// it. Dropping the handle stops the task.
pub struct YarrboardClient {
    config: ClientConfig,
    commands: mpsc::Sender<ClientCommand>,
    status_rx: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl YarrboardClient {
    /// Create a client that talks WebSocket. Call [`YarrboardClient::start`] to connect.
    pub fn spawn(config: ClientConfig, handler: impl ClientHandler) -> Result<Self, ClientError> {
        let connector = WebSocketConnector::new(config.connect_timeout);
        Self::with_connector(config, Arc::new(connector), handler)
    }

    /// Create a client on a custom transport
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn TransportConnector>,
        handler: impl ClientHandler,
    ) -> Result<Self, ClientError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Session::new(config.clone(), connector, Box::new(handler), events_tx, now())?;
        let status_rx = session.subscribe_status();

        let (commands_tx, commands_rx) = mpsc::channel(100);
        let span = info_span!("yarrboard", board = %config.board_name());
        let task = tokio::spawn(connection_loop(session, commands_rx, events_rx).instrument(span));

        Ok(Self {
            config,
            commands: commands_tx,
            status_rx,
            task: Some(task),
        })
    }

    /// Open the connection; no-op unless idle or failed
    pub async fn start(&self) -> Result<(), ClientError> {
        self.request(ClientCommand::Start).await
    }

    /// Close the connection and stop reconnecting
    pub async fn close(&self) -> Result<(), ClientError> {
        self.request(ClientCommand::Close).await
    }

    /// Current lifecycle state
    pub fn status(&self) -> ConnectionState {
        *self.status_rx.borrow()
    }

    /// Watch lifecycle state changes
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionState> {
        self.status_rx.clone()
    }

    /// Queue a command for delivery
    ///
    /// With `require_confirmation` the command gets a correlation id and is
    /// resent until the board echoes it back. Without it, the command is
    /// dropped if anything else is already queued.
    pub async fn send(
        &self,
        command: Command,
        require_confirmation: bool,
    ) -> Result<SendOutcome, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.request(ClientCommand::Send {
            command,
            require_confirmation,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Stopped)?
    }

    /// Message counters and rates
    pub async fn stats(&self) -> Result<MessageStats, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.request(ClientCommand::Stats { reply }).await?;
        rx.await.map_err(|_| ClientError::Stopped)
    }

    /// Close the connection and wait for the connection task to exit
    pub async fn shutdown(mut self) -> Result<(), ClientError> {
        // The task may already be gone
        let _ = self.commands.send(ClientCommand::Shutdown).await;
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }

    pub async fn set_channel_state(&self, id: u32, state: bool) -> Result<SendOutcome, ClientError> {
        self.send(Command::set_channel_state(id, state), true).await
    }

    pub async fn toggle_channel(&self, id: u32) -> Result<SendOutcome, ClientError> {
        self.send(Command::toggle_channel(id), true).await
    }

    /// Fire-and-forget; a newer duty supersedes a lost one
    pub async fn set_channel_duty(&self, id: u32, duty: f64) -> Result<SendOutcome, ClientError> {
        self.send(Command::set_channel_duty(id, duty), false).await
    }

    pub async fn fade_channel(
        &self,
        id: u32,
        duty: f64,
        millis: u64,
    ) -> Result<SendOutcome, ClientError> {
        self.send(Command::fade_channel(id, duty, millis), false).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn request(&self, command: ClientCommand) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Stopped)
    }
}

impl Drop for YarrboardClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Drive the session: user requests, transport events and scheduled tasks
async fn connection_loop(
    mut session: Session,
    mut commands: mpsc::Receiver<ClientCommand>,
    mut events: mpsc::UnboundedReceiver<TransportEnvelope>,
) {
    loop {
        let deadline = session.next_deadline();

        tokio::select! {
            command = commands.recv() => match command {
                Some(ClientCommand::Start) => session.start(now()),
                Some(ClientCommand::Close) => session.close(),
                Some(ClientCommand::Send { command, require_confirmation, reply }) => {
                    let outcome = session
                        .send(command, require_confirmation, now())
                        .map_err(ClientError::from);
                    let _ = reply.send(outcome);
                }
                Some(ClientCommand::Stats { reply }) => {
                    let _ = reply.send(session.stats(now()));
                }
                Some(ClientCommand::Shutdown) | None => {
                    session.close();
                    break;
                }
            },

            Some(envelope) = events.recv() => {
                session.handle_transport_event(envelope, now());
            }

            _ = sleep_until_deadline(deadline) => {
                session.run_due(now());
            }
        }
    }

    debug!("Connection task stopped");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// Current time on tokio's clock, so paused-time tests stay consistent
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
