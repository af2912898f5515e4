//! Light link: the persistent channel to the native light controller, with
//! bounded automatic reconnection and a fire-and-forget command API.

pub mod channel;
mod error;
pub mod link;
pub mod process;

pub use channel::{Channel, ChannelEvent, ChannelId, Connector, EventSink};
pub use error::{DeviceError, LinkError, TransportError};
pub use link::{ConnectionState, LightLink, LinkEvent, ReconnectPolicy};
pub use process::{NativeHostChannel, NativeHostConnector};
