use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use punchlight_core::frame::{read_message, write_message};
use punchlight_core::{DeviceReply, FrameError};

use crate::cache::HostCache;
use crate::controller::PunchLightController;
use crate::device::LightBackend;
use crate::error::{io_err, HostError};
use crate::kasa::KasaBackend;
use crate::request::handle_message;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
pub const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(60);

pub type SharedController<B> = Arc<Mutex<PunchLightController<B>>>;

/// Run the native host on stdin/stdout and block until the browser closes
/// the channel.
pub fn start_blocking() -> Result<(), HostError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(async {
        let cache = match HostCache::open() {
            Ok(cache) => Some(cache),
            Err(err) => {
                tracing::warn!(error = %err, "light address cache unavailable");
                None
            }
        };
        let controller = PunchLightController::new(KasaBackend::default(), cache);
        serve(controller, tokio::io::stdin(), tokio::io::stdout()).await
    })
}

/// Startup discovery, periodic refresh and the message session.
pub async fn serve<B, R, W>(
    controller: PunchLightController<B>,
    reader: R,
    writer: W,
) -> Result<(), HostError>
where
    B: LightBackend + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let controller: SharedController<B> = Arc::new(Mutex::new(controller));

    if let Err(err) = controller.lock().await.discover_light().await {
        tracing::warn!(error = %err, "could not discover light on startup");
    }

    let refresh = tokio::spawn(periodic_refresh(
        controller.clone(),
        REFRESH_INTERVAL,
        REFRESH_RETRY_DELAY,
    ));
    tracing::info!(interval_hours = REFRESH_INTERVAL.as_secs() / 3600, "started periodic refresh");

    let result = run_session(&controller, reader, writer).await;
    refresh.abort();
    result
}

/// Re-apply the last punch state every `interval`. After a failure the loop
/// waits `retry_delay` before starting the next interval.
pub async fn periodic_refresh<B: LightBackend>(
    controller: SharedController<B>,
    interval: Duration,
    retry_delay: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;
        let outcome = controller.lock().await.refresh().await;
        if let Err(err) = outcome {
            tracing::error!(error = %err, "periodic refresh failed");
            tokio::time::sleep(retry_delay).await;
        }
    }
}

/// Answer framed requests until EOF. Bad frames get an error reply and the
/// loop carries on.
pub async fn run_session<B, R, W>(
    controller: &SharedController<B>,
    mut reader: R,
    mut writer: W,
) -> Result<(), HostError>
where
    B: LightBackend,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let message = match read_message::<_, Value>(&mut reader).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::info!("native channel closed; exiting");
                return Ok(());
            }
            Err(FrameError::Io(err)) if err.kind() != std::io::ErrorKind::UnexpectedEof => {
                tracing::error!(error = %err, "native channel read failed");
                return Err(FrameError::Io(err).into());
            }
            Err(err) => {
                tracing::error!(error = %err, "invalid native message");
                write_message(&mut writer, &DeviceReply::error(err.to_string())).await?;
                continue;
            }
        };

        tracing::debug!(%message, "received message");
        let reply = {
            let mut controller = controller.lock().await;
            handle_message(&mut controller, &message).await
        };
        write_message(&mut writer, &reply).await?;
    }
}

/// Log to stderr; stdout carries the native channel.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
