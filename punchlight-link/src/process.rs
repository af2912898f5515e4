//! Native host transport: the channel is a child process speaking framed
//! JSON on stdin/stdout.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};

use punchlight_core::frame::{encode_message, read_message};
use punchlight_core::{DeviceReply, LightCommand};

use crate::channel::{Channel, Connector, EventSink};
use crate::error::TransportError;

/// Spawns the native host command for every channel it opens.
#[derive(Debug, Clone)]
pub struct NativeHostConnector {
    program: PathBuf,
    args: Vec<String>,
}

impl NativeHostConnector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The running executable in `host` mode.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, vec!["host".to_string()]))
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl Connector for NativeHostConnector {
    type Channel = NativeHostChannel;

    fn open(&mut self, endpoint: &str, sink: EventSink) -> Result<NativeHostChannel, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| TransportError::new(format!("no async runtime for native host: {err}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                TransportError::new(format!(
                    "failed to start native host {} for {endpoint}: {err}",
                    self.program.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::new("native host stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::new("native host stdout unavailable"))?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        runtime.spawn(writer_task(stdin, outgoing_rx));
        runtime.spawn(reader_task(child, stdout, sink, kill_rx));

        tracing::debug!(program = %self.program.display(), "native host spawned");
        Ok(NativeHostChannel {
            outgoing: Some(outgoing_tx),
            kill: Some(kill_tx),
        })
    }
}

/// Write side of a spawned native host.
#[derive(Debug)]
pub struct NativeHostChannel {
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    kill: Option<oneshot::Sender<()>>,
}

impl Channel for NativeHostChannel {
    fn post(&mut self, command: &LightCommand) -> Result<(), TransportError> {
        let frame = encode_message(command)
            .map_err(|err| TransportError::new(format!("failed to encode command: {err}")))?;
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| TransportError::new("native host channel closed"))?;
        outgoing
            .send(frame)
            .map_err(|_| TransportError::new("native host input closed"))
    }

    fn close(&mut self) {
        self.outgoing = None;
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

async fn writer_task(mut stdin: ChildStdin, mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = outgoing.recv().await {
        if let Err(err) = stdin.write_all(&frame).await {
            tracing::warn!(error = %err, "native host write failed");
            break;
        }
        if let Err(err) = stdin.flush().await {
            tracing::warn!(error = %err, "native host flush failed");
            break;
        }
    }
}

async fn reader_task(
    mut child: Child,
    mut stdout: ChildStdout,
    sink: EventSink,
    mut kill: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            // Fires on an explicit close and when the channel handle is dropped.
            _ = &mut kill => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return;
            }
            received = read_message::<_, DeviceReply>(&mut stdout) => match received {
                Ok(Some(reply)) => {
                    if !sink.message(reply) {
                        let _ = child.start_kill();
                        return;
                    }
                }
                Ok(None) => {
                    let error = match child.wait().await {
                        Ok(status) => exit_error(status),
                        Err(err) => Some(format!("failed to reap native host: {err}")),
                    };
                    sink.disconnected(error);
                    return;
                }
                Err(err) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    sink.disconnected(Some(format!("native host sent an invalid message: {err}")));
                    return;
                }
            }
        }
    }
}

fn exit_error(status: ExitStatus) -> Option<String> {
    if status.success() {
        None
    } else {
        Some(format!("native host has exited ({status})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{LightLink, LinkEvent};
    use crate::LinkError;

    #[tokio::test]
    async fn missing_program_is_not_connected() {
        let connector =
            NativeHostConnector::new("/nonexistent/punchlight-native-host", Vec::new());
        let mut link = LightLink::new(connector);
        let err = link.discover().unwrap_err();
        assert_eq!(err, LinkError::NotConnected);
        assert!(!link.has_channel());
    }

    #[test]
    fn open_outside_runtime_fails_synchronously() {
        let connector = NativeHostConnector::new("true", Vec::new());
        let mut link = LightLink::new(connector);
        assert_eq!(link.turn_off().unwrap_err(), LinkError::NotConnected);
    }

    #[cfg(all(unix, target_endian = "little"))]
    #[tokio::test]
    async fn reads_reply_then_reports_clean_exit() {
        // 15-byte `{"status":"ok"}` frame, then exit 0.
        let script = r#"printf '\017\000\000\000{"status":"ok"}'"#;
        let connector = NativeHostConnector::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
        );
        let mut link = LightLink::new(connector);
        link.update_light(false).expect("send");

        let reply = link.wait_for_reply().await.expect("reply");
        assert!(reply.is_ok());
        assert!(link.is_confirmed());

        match link.next_event().await {
            Some(LinkEvent::Disconnected { error, retry_in }) => {
                assert!(error.is_none(), "clean exit has no error: {error:?}");
                assert!(retry_in.is_some());
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert_eq!(link.reconnect_attempts(), 1);
        link.disconnect();
        assert!(link.retry_deadline().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_host_reports_exit_status() {
        let connector = NativeHostConnector::new(
            "sh",
            vec!["-c".to_string(), "exit 3".to_string()],
        );
        let mut link = LightLink::new(connector);
        link.connect();
        assert!(link.has_channel());

        match link.next_event().await {
            Some(LinkEvent::Disconnected { error, .. }) => {
                let error = error.expect("error for non-zero exit");
                assert!(error.contains("exited"), "got: {error}");
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
        link.disconnect();
    }
}
