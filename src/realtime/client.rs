use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    dispatch::Dispatcher,
    machine::{Action, CloseReason, ConnectionState, Machine, ReconnectPolicy},
};
use crate::{config::Config, error::RealtimeError, models::SensorUpdate};

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub policy: ReconnectPolicy,
}

impl From<&Config> for RealtimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            url: config.ws_url.clone(),
            policy: config.reconnect,
        }
    }
}

#[derive(Debug)]
enum Command {
    Send(String),
}

/// Self-healing subscription to the backend's `/ws` stream.
///
/// Owns at most one socket at a time. Subscribe before [`RealtimeClient::start`]
/// to be sure not to miss the first frames. Dropping the client (or calling
/// [`RealtimeClient::disconnect`]) closes the socket and cancels any pending
/// reconnect; neither counts as a lost connection.
pub struct RealtimeClient {
    config: RealtimeConfig,
    dispatcher: Arc<Dispatcher>,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        Self {
            config,
            dispatcher: Arc::new(Dispatcher::new()),
            state_tx: watch::Sender::new(ConnectionState::Idle),
            commands,
            command_rx: Mutex::new(Some(command_rx)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// `new` followed by `start`.
    pub fn connect(config: RealtimeConfig) -> Self {
        let client = Self::new(config);
        client.start();
        client
    }

    /// Spawn the connection driver on the current Tokio runtime. Later calls
    /// are no-ops.
    pub fn start(&self) {
        let Some(command_rx) = self
            .command_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let driver = Driver {
            url: self.config.url.clone(),
            machine: Machine::new(self.config.policy),
            dispatcher: self.dispatcher.clone(),
            state_tx: self.state_tx.clone(),
            commands: command_rx,
            cancel: self.cancel.clone(),
        };
        let handle = tokio::spawn(driver.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Raw `data` payloads of frames with the given `type`.
    pub fn subscribe(&self, kind: &str) -> mpsc::UnboundedReceiver<Value> {
        self.dispatcher.subscribe(kind)
    }

    pub fn sensor_updates(&self) -> mpsc::UnboundedReceiver<SensorUpdate> {
        self.dispatcher.sensor_updates()
    }

    /// Send a JSON message. Fails unless the socket is currently open.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<(), RealtimeError> {
        if !self.current_state().is_open() {
            return Err(RealtimeError::NotConnected);
        }
        let text = serde_json::to_string(message)?;
        self.commands
            .send(Command::Send(text))
            .map_err(|_| RealtimeError::Closed)
    }

    /// Resolves when the client reaches its terminal state.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.state();
        let reason = match rx.wait_for(|s| s.is_closed()).await {
            Ok(state) => match *state {
                ConnectionState::Closed(reason) => reason,
                _ => CloseReason::Requested,
            },
            Err(_) => CloseReason::Requested,
        };
        reason
    }

    /// Close the socket, cancel any pending reconnect and wait for the driver
    /// to finish.
    pub async fn disconnect(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Realtime driver task failed");
                }
            }
            None => {
                self.state_tx
                    .send_replace(ConnectionState::Closed(CloseReason::Requested));
            }
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum SocketEnd {
    Lost,
    Cancelled,
}

struct Driver {
    url: String,
    machine: Machine,
    dispatcher: Arc<Dispatcher>,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.machine.on_connecting();
            self.publish();
            info!(url = %self.url, "Connecting realtime socket");

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.stop();
                    return;
                }
                res = connect_async(self.url.as_str()) => res,
            };

            match connected {
                Ok((socket, _)) => {
                    self.discard_stale_commands();
                    self.machine.on_open();
                    self.publish();
                    info!(url = %self.url, "Realtime socket connected");

                    match self.pump(socket).await {
                        SocketEnd::Cancelled => {
                            self.stop();
                            return;
                        }
                        SocketEnd::Lost => info!("Realtime socket disconnected"),
                    }
                }
                Err(e) => warn!(url = %self.url, error = %e, "Realtime connection failed"),
            }

            match self.machine.on_close() {
                Action::Reconnect { attempt, after } => {
                    self.publish();
                    info!(attempt, delay_ms = after.as_millis() as u64, "Scheduling realtime reconnect");
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.stop();
                            return;
                        }
                        _ = tokio::time::sleep(after) => {}
                    }
                }
                Action::GiveUp => {
                    self.publish();
                    error!(
                        attempts = self.machine.attempts(),
                        "Realtime reconnect attempts exhausted; giving up"
                    );
                    return;
                }
                Action::Stop => return,
            }
        }
    }

    /// Shuttle frames until the socket goes away or the owner cancels.
    async fn pump<S>(&mut self, socket: S) -> SocketEnd
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame not delivered");
                    }
                    return SocketEnd::Cancelled;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::text(text)).await {
                            warn!(error = %e, "Realtime send failed");
                            return SocketEnd::Lost;
                        }
                    }
                    None => return SocketEnd::Cancelled,
                },
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => self.dispatcher.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.dispatcher.handle_text(text),
                        Err(_) => warn!(len = bytes.len(), "Discarding non-UTF-8 realtime frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!(frame = ?frame, "Server closed realtime socket");
                        return SocketEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Realtime socket error");
                        return SocketEnd::Lost;
                    }
                    None => return SocketEnd::Lost,
                },
            }
        }
    }

    /// Drop messages queued for a socket that is gone. They were accepted while
    /// a previous connection was open and must not leak onto the next one.
    fn discard_stale_commands(&mut self) -> usize {
        let mut dropped = 0;
        while self.commands.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Discarding messages queued for a lost realtime socket");
        }
        dropped
    }

    fn stop(&mut self) {
        self.machine.disconnect();
        self.publish();
        info!("Realtime client disconnected");
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.machine.state());
    }
}
