//! `punchlight light`: talk to the bulb directly from the terminal.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use punchlight_core::DeviceReply;
use punchlight_host::{validate_hsv, HostCache, KasaBackend, LightDevice, PunchLightController};

use super::{block_on, parse_bool};

#[derive(Args, Debug)]
pub struct LightArgs {
    /// Light address; skips the cache and broadcast discovery.
    #[arg(long, global = true)]
    pub host: Option<String>,

    #[command(subcommand)]
    pub action: LightAction,
}

#[derive(Subcommand, Debug)]
pub enum LightAction {
    /// Find the light on the network and cache its address.
    Discover,
    /// Show the punch state: soft green, or the warning color.
    Update {
        #[arg(value_parser = parse_bool, action = clap::ArgAction::Set, default_value = "false")]
        has_issues: bool,
    },
    /// Set an explicit HSV color.
    Set {
        #[arg(default_value_t = 0.0)]
        hue: f64,
        #[arg(default_value_t = 100.0)]
        saturation: f64,
        #[arg(default_value_t = 100.0)]
        value: f64,
    },
    /// Turn the light off.
    Off,
}

impl LightArgs {
    pub fn run(self) -> Result<()> {
        block_on(self.execute())?
    }

    async fn execute(self) -> Result<()> {
        let cache = match HostCache::open() {
            Ok(cache) => Some(cache),
            Err(err) => {
                tracing::warn!(error = %err, "light address cache unavailable");
                None
            }
        };
        let mut controller = PunchLightController::new(KasaBackend::default(), cache);
        if let Some(host) = self.host {
            controller = controller.with_host(host);
        }

        match self.action {
            LightAction::Discover => {
                let host = controller
                    .discover_light()
                    .await
                    .context("light discovery failed")?;
                let alias = controller
                    .device()
                    .map(|device| device.alias().to_string())
                    .unwrap_or_default();
                println!("Found light at {host}");
                println!("Alias: {alias}");
            }
            LightAction::Update { has_issues } => {
                let reply = controller
                    .update_light(has_issues)
                    .await
                    .context("failed to update light")?;
                print_reply(&reply)?;
            }
            LightAction::Set {
                hue,
                saturation,
                value,
            } => {
                let color = validate_hsv(hue, saturation, value).with_context(|| {
                    "usage: punchlight light set <hue 0-360> <saturation 0-100> <value 0-100>"
                })?;
                let reply = controller
                    .set_color(color)
                    .await
                    .context("failed to set light color")?;
                print_reply(&reply)?;
            }
            LightAction::Off => {
                let reply = controller
                    .turn_off()
                    .await
                    .context("failed to turn light off")?;
                print_reply(&reply)?;
            }
        }
        Ok(())
    }
}

fn print_reply(reply: &DeviceReply) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(reply).context("failed to render reply JSON")?
    );
    Ok(())
}
