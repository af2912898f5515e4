//! Channel abstraction between the link and a transport.
//!
//! A [`Connector`] opens a [`Channel`] and receives an [`EventSink`] to
//! report inbound replies and the channel's closure. Every event carries the
//! id of the channel that produced it, so the link can drop events from a
//! channel it has already replaced or closed.

use tokio::sync::mpsc;

use punchlight_core::{DeviceReply, LightCommand};

use crate::error::TransportError;

pub type ChannelId = u64;

/// Something a channel reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(DeviceReply),
    /// The channel closed without the owner asking. `error` carries the
    /// transport's reason when it has one.
    Disconnected { error: Option<String> },
}

/// Observer handed to a channel when it is opened.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: ChannelId,
    tx: mpsc::UnboundedSender<(ChannelId, ChannelEvent)>,
}

impl EventSink {
    pub(crate) fn new(id: ChannelId, tx: mpsc::UnboundedSender<(ChannelId, ChannelEvent)>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Deliver an inbound reply. Returns `false` once the link is gone.
    pub fn message(&self, reply: DeviceReply) -> bool {
        self.deliver(ChannelEvent::Message(reply))
    }

    /// Report that the channel closed.
    pub fn disconnected(&self, error: Option<String>) -> bool {
        self.deliver(ChannelEvent::Disconnected { error })
    }

    fn deliver(&self, event: ChannelEvent) -> bool {
        self.tx.send((self.id, event)).is_ok()
    }
}

/// Write side of an open channel.
pub trait Channel {
    /// Queue one command. Must not block; an error means the channel is
    /// unusable.
    fn post(&mut self, command: &LightCommand) -> Result<(), TransportError>;

    /// Close on the owner's request. No `Disconnected` event is expected
    /// afterwards, and any that arrives is ignored.
    fn close(&mut self);
}

/// Opens channels to a named endpoint.
pub trait Connector {
    type Channel: Channel;

    fn open(&mut self, endpoint: &str, sink: EventSink) -> Result<Self::Channel, TransportError>;
}
