pub mod host;
pub mod light;
pub mod link;
pub mod monitor;
pub mod remind;
pub mod report;
pub mod settings;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Run one async command to completion with logging on stderr.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    punchlight_host::runtime::init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Accepts the spellings people type for a flag value.
pub(crate) fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected true or false, got '{other}'")),
    }
}
