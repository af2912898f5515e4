//! Punchlight core library: domain types, settings persistence, native
//! message framing, and the collaborators around the light link.
//!
//! - [`types`]: punch reports, light commands, device replies
//! - [`error`]: [`CoreError`] and [`FrameError`]
//! - [`frame`]: length-prefixed JSON framing shared by both channel ends
//! - [`settings`]: load / save / record under `~/.punchlight/`
//! - [`staleness`], [`badge`], [`reminder`]: visit tracking and rendering

pub mod badge;
pub mod error;
pub mod frame;
pub mod paths;
pub mod reminder;
pub mod settings;
pub mod staleness;
pub mod types;

pub use badge::BadgeState;
pub use error::{CoreError, FrameError};
pub use settings::Settings;
pub use staleness::VisitSignal;
pub use types::{
    AlertTime, DeviceReply, Hsv, IssueDate, LightCommand, PunchIssue, PunchReport, ReplyStatus,
};
