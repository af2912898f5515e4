use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the native host: device protocol, discovery and the
/// message session.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("light {host} unreachable: {source}")]
    Network {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("light {host} did not answer within {timeout_ms} ms")]
    Timeout { host: String, timeout_ms: u64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] punchlight_core::CoreError),

    #[error("framing error: {0}")]
    Frame(#[from] punchlight_core::FrameError),

    #[error("device protocol error: {0}")]
    Protocol(String),

    #[error("No devices found. Make sure your light is powered on and on the same network.")]
    NoDevices,

    #[error("No light devices found.")]
    NoLights,

    #[error("Multiple lights found. Please specify host IP.")]
    MultipleLights,

    #[error("Device {alias} is not a light.")]
    NotALight { alias: String },

    #[error("Light {alias} doesn't support HSV color control.")]
    NoHsv { alias: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HostError {
    HostError::Io {
        path: path.into(),
        source,
    }
}
