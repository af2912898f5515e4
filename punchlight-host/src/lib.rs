//! Native messaging host that drives the punch light.
//!
//! The browser spawns this process and speaks framed JSON on stdin/stdout.
//! Each request is validated ([`request`]), run against the
//! [`controller::PunchLightController`], and answered with one reply.
//! Devices are reached through the [`device`] traits; [`kasa`] implements
//! them for TP-Link Kasa bulbs.

pub mod cache;
pub mod color;
pub mod controller;
pub mod device;
pub mod error;
pub mod kasa;
pub mod request;
pub mod runtime;

pub use cache::HostCache;
pub use controller::PunchLightController;
pub use device::{LightBackend, LightDevice};
pub use error::HostError;
pub use kasa::KasaBackend;
pub use request::{handle_message, parse_request, validate_hsv, LightRequest, RequestError};
