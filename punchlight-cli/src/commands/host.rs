//! `punchlight host`: the process the browser spawns for native messaging.

use anyhow::{Context, Result};

pub fn run() -> Result<()> {
    punchlight_host::runtime::start_blocking().context("native host exited with error")
}
