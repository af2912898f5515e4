//! `punchlight link`: exercise the light link end to end, the way the popup's
//! test buttons do.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use punchlight_core::{DeviceReply, LightCommand};
use punchlight_link::{LightLink, NativeHostConnector};

use super::block_on;

#[derive(Args, Debug, Clone)]
pub struct HostCommandArgs {
    /// Native host executable (default: this binary in `host` mode).
    #[arg(long, global = true)]
    pub host_command: Option<PathBuf>,

    /// Extra argument for `--host-command`; repeatable.
    #[arg(long = "host-arg", global = true)]
    pub host_args: Vec<String>,

    /// Seconds to wait for the host's reply.
    #[arg(long, global = true, default_value_t = 30)]
    pub reply_timeout: u64,
}

impl HostCommandArgs {
    pub fn connector(&self) -> Result<NativeHostConnector> {
        match &self.host_command {
            Some(program) => Ok(NativeHostConnector::new(program, self.host_args.clone())),
            None => NativeHostConnector::current_exe().context("could not locate punchlight binary"),
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout)
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    #[command(flatten)]
    pub host: HostCommandArgs,

    #[command(subcommand)]
    pub action: LinkAction,
}

#[derive(Subcommand, Debug)]
pub enum LinkAction {
    /// Show the punch state (issues unless `--no-issues`).
    Update {
        #[arg(long)]
        no_issues: bool,
    },
    /// Set an explicit HSV color.
    Set { hue: f64, saturation: f64, value: f64 },
    /// Turn the light off.
    Off,
    /// Ask the host to rediscover the light.
    Discover,
}

impl LinkAction {
    fn command(&self) -> LightCommand {
        match self {
            LinkAction::Update { no_issues } => LightCommand::UpdateLight {
                has_issues: !no_issues,
            },
            LinkAction::Set {
                hue,
                saturation,
                value,
            } => LightCommand::SetColor {
                hue: *hue,
                saturation: *saturation,
                value: *value,
            },
            LinkAction::Off => LightCommand::TurnOff,
            LinkAction::Discover => LightCommand::Discover,
        }
    }
}

impl LinkArgs {
    pub fn run(self) -> Result<()> {
        let connector = self.host.connector()?;
        let command = self.action.command();
        let reply = block_on(send_and_wait(connector, &command, self.host.reply_timeout()))??;

        println!(
            "{}",
            serde_json::to_string_pretty(&reply).context("failed to render reply JSON")?
        );
        if reply.is_ok() {
            println!("{} {}", "✓".green().bold(), command.action());
            Ok(())
        } else {
            let message = reply.message.unwrap_or_else(|| "unknown error".to_string());
            bail!("{} failed: {message}", command.action())
        }
    }
}

/// Open a link, send one command and wait for the first reply.
pub(crate) async fn send_and_wait(
    connector: NativeHostConnector,
    command: &LightCommand,
    wait: Duration,
) -> Result<DeviceReply> {
    let mut link = LightLink::new(connector);
    link.send_message(command)
        .with_context(|| format!("failed to send {}", command.action()))?;

    let reply = tokio::time::timeout(wait, link.wait_for_reply()).await;
    link.disconnect();
    match reply {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => bail!("native host closed the channel without replying"),
        Err(_) => bail!("no reply from native host within {}s", wait.as_secs()),
    }
}
