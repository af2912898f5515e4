//! Connection manager for the native light controller.
//!
//! State transitions:
//! - `connect()` with no channel: open one and mark `Connected` right away,
//!   before the host has acknowledged anything.
//! - `ok` reply: `Connected`, confirmed, reconnect counter back to 0.
//! - `error` reply: logged, nothing else changes.
//! - unsolicited close: `Disconnected`; while the counter is below
//!   `max_attempts` it is incremented and a `connect()` is scheduled after
//!   `delay`. Once exhausted the link stays idle until the next send.
//! - `disconnect()`: close, `Disconnected`, pending retry cancelled, counter
//!   untouched.
//!
//! The link owns its event queue. Nothing changes state except the methods
//! below, called by whoever owns the link, and [`LightLink::next_event`],
//! which applies inbound events and fires the retry timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use punchlight_core::paths::NATIVE_APP_NAME;
use punchlight_core::{DeviceReply, LightCommand, ReplyStatus};

use crate::channel::{Channel, ChannelEvent, ChannelId, Connector, EventSink};
use crate::error::{DeviceError, LinkError};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Bounded, flat-delay reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            delay: RECONNECT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Outcome of one processed event, for callers that want to observe them.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A reply arrived on the current channel (any status).
    Reply(DeviceReply),
    /// The current channel closed on its own. `retry_in` is set when a
    /// reconnect was scheduled.
    Disconnected {
        error: Option<String>,
        retry_in: Option<Duration>,
    },
    /// The scheduled reconnect ran.
    RetryFired { connected: bool },
}

struct ActiveChannel<T> {
    id: ChannelId,
    channel: T,
}

enum Wake {
    Event(ChannelId, ChannelEvent),
    Retry,
}

/// Owned connection to the light controller. Construct one and pass it to
/// whatever needs to drive the light.
pub struct LightLink<C: Connector> {
    connector: C,
    endpoint: String,
    policy: ReconnectPolicy,
    channel: Option<ActiveChannel<C::Channel>>,
    state: ConnectionState,
    confirmed: bool,
    reconnect_attempts: u32,
    retry_at: Option<Instant>,
    last_channel_id: ChannelId,
    events_tx: mpsc::UnboundedSender<(ChannelId, ChannelEvent)>,
    events_rx: mpsc::UnboundedReceiver<(ChannelId, ChannelEvent)>,
}

impl<C: Connector> LightLink<C> {
    pub fn new(connector: C) -> Self {
        Self::with_policy(connector, ReconnectPolicy::default())
    }

    pub fn with_policy(connector: C, policy: ReconnectPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            endpoint: NATIVE_APP_NAME.to_string(),
            policy,
            channel: None,
            state: ConnectionState::Disconnected,
            confirmed: false,
            reconnect_attempts: 0,
            retry_at: None,
            last_channel_id: 0,
            events_tx,
            events_rx,
        }
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// `true` once the current channel has produced an `ok` reply.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Whether a channel handle exists (connecting or connected).
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// When the pending reconnect will run, if one is scheduled.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Open a channel unless one already exists. Failures are logged and
    /// leave the link `Disconnected`.
    pub fn connect(&mut self) {
        if self.channel.is_some() {
            return;
        }

        self.last_channel_id += 1;
        let id = self.last_channel_id;
        let sink = EventSink::new(id, self.events_tx.clone());

        tracing::info!(endpoint = %self.endpoint, channel = id, "connecting to light controller");
        match self.connector.open(&self.endpoint, sink) {
            Ok(channel) => {
                self.channel = Some(ActiveChannel { id, channel });
                self.state = ConnectionState::Connected;
                self.confirmed = false;
                tracing::info!(channel = id, "light controller connected");
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to connect to light controller");
                self.channel = None;
                self.state = ConnectionState::Disconnected;
                self.confirmed = false;
            }
        }
    }

    /// Write one command. Connects first (once) when there is no channel.
    /// Does not wait for any reply.
    pub fn send_message(&mut self, command: &LightCommand) -> Result<(), LinkError> {
        if self.channel.is_none() {
            self.connect();
        }

        let Some(active) = self.channel.as_mut() else {
            tracing::error!(
                action = command.action(),
                "cannot send message: not connected to light controller"
            );
            return Err(LinkError::NotConnected);
        };

        match active.channel.post(command) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(
                    action = command.action(),
                    error = %err,
                    "error sending message to light controller"
                );
                if let Some(mut failed) = self.channel.take() {
                    failed.channel.close();
                }
                self.state = ConnectionState::Disconnected;
                self.confirmed = false;
                Err(LinkError::Transport(err))
            }
        }
    }

    pub fn update_light(&mut self, has_issues: bool) -> Result<(), LinkError> {
        tracing::info!(has_issues, "updating light");
        self.send_message(&LightCommand::UpdateLight { has_issues })
    }

    pub fn set_color(&mut self, hue: f64, saturation: f64, value: f64) -> Result<(), LinkError> {
        tracing::info!(hue, saturation, value, "setting light color");
        self.send_message(&LightCommand::SetColor {
            hue,
            saturation,
            value,
        })
    }

    pub fn turn_off(&mut self) -> Result<(), LinkError> {
        tracing::info!("turning light off");
        self.send_message(&LightCommand::TurnOff)
    }

    pub fn discover(&mut self) -> Result<(), LinkError> {
        tracing::info!("discovering light");
        self.send_message(&LightCommand::Discover)
    }

    /// Close on request. Never counts as a reconnect attempt and cancels a
    /// reconnect that is still pending.
    pub fn disconnect(&mut self) {
        if self.retry_at.take().is_some() {
            tracing::debug!("cancelled pending reconnect");
        }
        if let Some(mut active) = self.channel.take() {
            active.channel.close();
            tracing::info!(channel = active.id, "light controller disconnected by request");
        }
        self.state = ConnectionState::Disconnected;
        self.confirmed = false;
    }

    // -----------------------------------------------------------------------
    // Event processing
    // -----------------------------------------------------------------------

    /// Wait for the next event that concerns the current channel, or for the
    /// pending reconnect, and apply it. Returns `None` when the link is idle:
    /// no channel and no reconnect scheduled.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        loop {
            if self.channel.is_none() && self.retry_at.is_none() {
                return None;
            }

            let retry_at = self.retry_at;
            let wake = tokio::select! {
                biased;
                received = self.events_rx.recv() => match received {
                    Some((id, event)) => Wake::Event(id, event),
                    None => return None,
                },
                _ = wait_until(retry_at) => Wake::Retry,
            };

            match wake {
                Wake::Event(id, event) => {
                    if let Some(outcome) = self.apply(id, event) {
                        return Some(outcome);
                    }
                }
                Wake::Retry => {
                    self.retry_at = None;
                    tracing::info!(
                        attempt = self.reconnect_attempts,
                        "retrying light controller connection"
                    );
                    self.connect();
                    return Some(LinkEvent::RetryFired {
                        connected: self.channel.is_some(),
                    });
                }
            }
        }
    }

    /// Process events until a reply arrives. Returns `None` if the channel
    /// closes first or the link goes idle.
    pub async fn wait_for_reply(&mut self) -> Option<DeviceReply> {
        loop {
            match self.next_event().await? {
                LinkEvent::Reply(reply) => return Some(reply),
                LinkEvent::Disconnected { .. } => return None,
                LinkEvent::RetryFired { .. } => {}
            }
        }
    }

    fn apply(&mut self, id: ChannelId, event: ChannelEvent) -> Option<LinkEvent> {
        if self.channel.as_ref().map(|active| active.id) != Some(id) {
            tracing::debug!(channel = id, "ignoring event from a closed channel");
            return None;
        }

        match event {
            ChannelEvent::Message(reply) => {
                self.on_reply(&reply);
                Some(LinkEvent::Reply(reply))
            }
            ChannelEvent::Disconnected { error } => {
                let retry_in = self.on_disconnect(error.as_deref());
                Some(LinkEvent::Disconnected { error, retry_in })
            }
        }
    }

    fn on_reply(&mut self, reply: &DeviceReply) {
        tracing::debug!(status = ?reply.status, details = ?reply.details, "light controller response");
        match reply.status {
            ReplyStatus::Ok => {
                self.state = ConnectionState::Connected;
                self.confirmed = true;
                self.reconnect_attempts = 0;
            }
            ReplyStatus::Error => {
                let err = DeviceError::from(reply);
                tracing::error!(error = %err, "light controller reported an error");
            }
            ReplyStatus::Unknown => {}
        }
    }

    fn on_disconnect(&mut self, error: Option<&str>) -> Option<Duration> {
        tracing::info!("light controller disconnected");
        if let Some(error) = error {
            tracing::error!(error, "disconnect error");
        }
        self.channel = None;
        self.state = ConnectionState::Disconnected;
        self.confirmed = false;

        if self.reconnect_attempts < self.policy.max_attempts {
            self.reconnect_attempts += 1;
            tracing::info!(
                attempt = self.reconnect_attempts,
                max = self.policy.max_attempts,
                "scheduling reconnect"
            );
            self.retry_at = Some(Instant::now() + self.policy.delay);
            Some(self.policy.delay)
        } else {
            tracing::warn!(
                max = self.policy.max_attempts,
                "reconnect attempts exhausted; waiting for the next send"
            );
            None
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
