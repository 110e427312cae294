//! Client session - connection lifecycle and the glue between components
//!
//! All mutable client state lives here and is touched from one task only.
//! Every method takes the current time, so the whole lifecycle can be driven
//! deterministically from tests.

use super::config::{ClientConfig, ConfigError};
use crate::delivery::{Backpressure, DeliveryEngine, DrainAction, SendOutcome};
use crate::dispatch::{Dispatch, DispatchContext, InboundDispatcher};
use crate::gate::UpdateGate;
use crate::handler::ClientHandler;
use crate::liveness::{Liveness, LivenessMonitor};
use crate::scheduler::{Scheduler, Task};
use crate::stats::{MessageStats, StatsTracker};
use crate::transport::{EventSink, TransportConnector, TransportEnvelope, TransportEvent, TransportLink};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use yarrboard_shared::codec::CodecError;
use yarrboard_shared::state_machine::{ConnectionStateMachine, LifecycleEvent, TransitionResult};
use yarrboard_shared::{Command, ConnectionState};

pub struct Session {
    config: ClientConfig,
    uri: String,
    lifecycle: ConnectionStateMachine,
    connector: Arc<dyn TransportConnector>,
    link: Option<Box<dyn TransportLink>>,
    events_tx: mpsc::UnboundedSender<TransportEnvelope>,
    /// Identifies the current link; events from older links are ignored
    generation: u64,
    /// Bumped by every user close; reconnect tasks from older epochs are stale
    epoch: u64,
    closed: bool,
    engine: DeliveryEngine,
    dispatcher: InboundDispatcher,
    liveness: LivenessMonitor,
    gate: UpdateGate,
    scheduler: Scheduler,
    stats: StatsTracker,
    handler: Box<dyn ClientHandler>,
    status_tx: watch::Sender<ConnectionState>,
}

impl Session {
    /// Create an idle session; nothing happens until [`Session::start`]
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn TransportConnector>,
        handler: Box<dyn ClientHandler>,
        events_tx: mpsc::UnboundedSender<TransportEnvelope>,
        now: Instant,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let backpressure = Backpressure::new(
            config.min_backpressure_delay,
            config.max_backpressure_delay,
            config.backpressure_decay,
            config.rng_seed,
        );
        let (status_tx, _) = watch::channel(ConnectionState::Idle);

        Ok(Self {
            uri: config.uri(),
            lifecycle: ConnectionStateMachine::new(
                config.max_connection_retries,
                config.heartbeat_rate,
            ),
            connector,
            link: None,
            events_tx,
            generation: 0,
            epoch: 0,
            closed: true,
            engine: DeliveryEngine::new(config.message_timeout, backpressure),
            dispatcher: InboundDispatcher::new(),
            liveness: LivenessMonitor::new(config.liveness_deadline(), now),
            gate: UpdateGate::new(),
            scheduler: Scheduler::new(),
            stats: StatsTracker::new(now),
            handler,
            status_tx,
            config,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionState> {
        self.status_tx.subscribe()
    }

    #[cfg(test)]
    pub fn engine(&self) -> &DeliveryEngine {
        &self.engine
    }

    #[cfg(test)]
    pub fn gate(&self) -> &UpdateGate {
        &self.gate
    }

    pub fn retry_count(&self) -> u32 {
        self.lifecycle.retry_count()
    }

    /// Earliest scheduled task
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn stats(&self, now: Instant) -> MessageStats {
        self.stats.snapshot(now)
    }

    /// Open a connection. No-op unless idle or failed.
    pub fn start(&mut self, now: Instant) {
        match self.lifecycle.process_event(LifecycleEvent::Start) {
            TransitionResult::Success(_) => {}
            other => {
                debug!("Start ignored: {:?}", other);
                return;
            }
        }

        self.closed = false;
        self.scheduler.clear();
        self.scheduler.schedule(now, Task::Drain);
        self.scheduler
            .schedule(now + self.config.heartbeat_rate, Task::Heartbeat);
        if let Some(interval) = self.config.stats_interval {
            self.stats.sample(now);
            self.scheduler.schedule(now + interval, Task::Stats);
        }

        self.open_transport();
        self.publish_state();
    }

    /// User-initiated shutdown; nothing reconnects until the next start
    pub fn close(&mut self) {
        self.closed = true;
        self.epoch += 1;
        self.scheduler.clear();

        if let Some(mut link) = self.link.take() {
            // Detach first so the close we cause is not mistaken for a drop
            link.detach();
            link.close();
            info!("Closed");
        }

        self.lifecycle.process_event(LifecycleEvent::Shutdown);
        self.engine.reset();
        self.gate.clear();
        self.publish_state();
    }

    /// Queue a command for delivery
    pub fn send(
        &mut self,
        command: Command,
        require_confirmation: bool,
        now: Instant,
    ) -> Result<SendOutcome, CodecError> {
        self.engine.send(command, require_confirmation, now)
    }

    /// Handle an event from the transport
    pub fn handle_transport_event(&mut self, envelope: TransportEnvelope, now: Instant) {
        if self.closed || envelope.generation != self.generation {
            debug!(
                "Ignoring event from stale connection {}: {:?}",
                envelope.generation, envelope.event
            );
            return;
        }

        match envelope.event {
            TransportEvent::Open => self.on_open(now),
            TransportEvent::Error(info) => self.on_error(&info),
            TransportEvent::Close(info) => self.on_close(&info, now),
            TransportEvent::Message(frame) => self.on_frame(&frame, now),
        }
    }

    /// Run every task due at `now`
    pub fn run_due(&mut self, now: Instant) {
        while let Some(task) = self.scheduler.pop_due(now) {
            match task {
                Task::Drain => self.drain_cycle(now),
                Task::Heartbeat => self.heartbeat(now),
                Task::Reconnect { epoch } => self.reconnect(epoch),
                Task::Stats => self.log_stats(now),
            }
        }
    }

    fn on_open(&mut self, now: Instant) {
        match self.lifecycle.process_event(LifecycleEvent::Opened) {
            TransitionResult::Success(_) => {}
            other => {
                warn!("Unexpected open: {:?}", other);
                return;
            }
        }

        info!("Connected");
        self.engine.reset();
        self.gate.clear();
        self.liveness.reset(now);

        if self.config.require_login {
            let login = Command::login(&self.config.username, &self.config.password);
            if let Err(e) = self.engine.send(login, true, now) {
                error!("Failed to queue login: {}", e);
            }
        }
        if self.config.fetch_config_on_open {
            if let Err(e) = self.engine.send(Command::get_config(), true, now) {
                error!("Failed to queue config request: {}", e);
            }
        }

        self.publish_state();
        self.handler.on_open();
    }

    fn on_error(&mut self, info: &str) {
        warn!("Connection error: {}", info);
        self.handler.on_error(info);
    }

    fn on_close(&mut self, info: &str, now: Instant) {
        info!("Connection closed: {}", info);
        if let Some(progress) = self.gate.progress() {
            info!("Board closed the link during a firmware update at {}%", progress);
        }

        if let Some(mut link) = self.link.take() {
            link.detach();
        }

        match self.lifecycle.process_event(LifecycleEvent::Closed) {
            TransitionResult::Reconnect { attempt, delay } => {
                info!("Reconnecting... {} in {}ms", attempt, delay.as_millis());
                self.scheduler
                    .schedule(now + delay, Task::Reconnect { epoch: self.epoch });
            }
            TransitionResult::Failed { attempts } => {
                error!("Giving up after {} reconnect attempts", attempts);
                self.scheduler.clear();
                self.engine.reset();
            }
            other => debug!("Close ignored: {:?}", other),
        }

        self.publish_state();
        self.handler.on_close(info);
    }

    fn on_frame(&mut self, frame: &Bytes, now: Instant) {
        self.stats.record_received();

        let ctx = DispatchContext {
            engine: &mut self.engine,
            liveness: &mut self.liveness,
            gate: &mut self.gate,
        };
        if let Dispatch::Forward(message) = self.dispatcher.dispatch(frame, now, ctx) {
            self.handler.on_message(&message);
        }
    }

    fn drain_cycle(&mut self, now: Instant) {
        if !self.is_running() {
            return;
        }

        if self.state() == ConnectionState::Connected && !self.gate.is_engaged() {
            match self.engine.drain_cycle(now) {
                DrainAction::Send { frame, .. } | DrainAction::Resend { frame, .. } => {
                    self.transmit(frame);
                }
                DrainAction::Abandon { .. } | DrainAction::Idle => {}
            }
        }

        let delay = self.engine.finish_cycle();
        self.scheduler.schedule(now + delay, Task::Drain);
    }

    fn heartbeat(&mut self, now: Instant) {
        if !self.is_running() {
            return;
        }

        if self.state() == ConnectionState::Connected {
            match self.liveness.check(now) {
                Liveness::Dead { silent_for } => {
                    warn!("Missed heartbeat ({}ms silent)", silent_for.as_millis());
                    self.force_close("missed heartbeat", now);
                }
                Liveness::Alive => {
                    if let Err(e) = self.engine.send(Command::ping(), false, now) {
                        error!("Failed to queue heartbeat: {}", e);
                    }
                }
            }
        }

        // Giving up clears the schedule; keep it empty
        if self.is_running() {
            self.scheduler
                .schedule(now + self.config.heartbeat_rate, Task::Heartbeat);
        }
    }

    fn reconnect(&mut self, epoch: u64) {
        if self.closed || epoch != self.epoch || self.state() != ConnectionState::Retrying {
            debug!("Discarding stale reconnect");
            return;
        }
        self.open_transport();
    }

    fn log_stats(&mut self, now: Instant) {
        if !self.is_running() {
            return;
        }

        let stats = self.stats.sample(now);
        info!(
            "Recd m/s: {} | Sent m/s: {} | Total Received/Sent: {} / {} | Queued: {} | Malformed: {} | Unexpected acks: {}",
            stats.received_per_sec,
            stats.sent_per_sec,
            stats.received,
            stats.sent,
            self.engine.queue_len(),
            self.dispatcher.malformed(),
            self.dispatcher.unexpected_acks()
        );

        if let Some(interval) = self.config.stats_interval {
            self.scheduler.schedule(now + interval, Task::Stats);
        }
    }

    /// Kill the current link and run the close handling ourselves
    fn force_close(&mut self, reason: &str, now: Instant) {
        if let Some(mut link) = self.link.take() {
            link.detach();
            link.close();
        }
        self.on_close(reason, now);
    }

    /// Replace the current link with a fresh one
    fn open_transport(&mut self) {
        if let Some(mut old) = self.link.take() {
            old.detach();
            old.close();
        }

        self.generation += 1;
        let events = EventSink::new(self.generation, self.events_tx.clone());
        info!(
            "Connecting to {} via {} (attempt {})",
            self.uri,
            self.connector.name(),
            self.retry_count() + 1
        );
        self.link = Some(self.connector.open(&self.uri, events));
    }

    fn transmit(&mut self, frame: Bytes) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        match link.send(frame) {
            Ok(()) => self.stats.record_sent(),
            Err(e) => warn!("Send error: {}", e),
        }
    }

    fn is_running(&self) -> bool {
        !self.closed && self.state() != ConnectionState::Failed
    }

    fn publish_state(&self) {
        self.status_tx.send_replace(self.state());
    }
}
