//! Reconnect state machine behavior against an in-memory channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use punchlight_core::{DeviceReply, LightCommand};
use punchlight_link::{
    Channel, ConnectionState, Connector, EventSink, LightLink, LinkError, LinkEvent,
    TransportError,
};
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

#[derive(Default)]
struct Wire {
    opens: usize,
    closes: usize,
    sinks: Vec<EventSink>,
    posted: Vec<LightCommand>,
    refuse_open: bool,
    fail_post: bool,
}

#[derive(Clone, Default)]
struct FakeConnector(Arc<Mutex<Wire>>);

struct FakeChannel(Arc<Mutex<Wire>>);

impl Channel for FakeChannel {
    fn post(&mut self, command: &LightCommand) -> Result<(), TransportError> {
        let mut wire = self.0.lock().expect("wire");
        if wire.fail_post {
            return Err(TransportError::new("broken pipe"));
        }
        wire.posted.push(command.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.0.lock().expect("wire").closes += 1;
    }
}

impl Connector for FakeConnector {
    type Channel = FakeChannel;

    fn open(&mut self, _endpoint: &str, sink: EventSink) -> Result<FakeChannel, TransportError> {
        let mut wire = self.0.lock().expect("wire");
        wire.opens += 1;
        if wire.refuse_open {
            return Err(TransportError::new("native host not found"));
        }
        wire.sinks.push(sink);
        Ok(FakeChannel(self.0.clone()))
    }
}

impl FakeConnector {
    fn opens(&self) -> usize {
        self.0.lock().expect("wire").opens
    }

    fn closes(&self) -> usize {
        self.0.lock().expect("wire").closes
    }

    fn posted(&self) -> Vec<LightCommand> {
        self.0.lock().expect("wire").posted.clone()
    }

    fn latest_sink(&self) -> EventSink {
        self.0
            .lock()
            .expect("wire")
            .sinks
            .last()
            .cloned()
            .expect("a channel was opened")
    }

    fn sink(&self, index: usize) -> EventSink {
        self.0.lock().expect("wire").sinks[index].clone()
    }

    fn set_refuse_open(&self, refuse: bool) {
        self.0.lock().expect("wire").refuse_open = refuse;
    }

    fn set_fail_post(&self, fail: bool) {
        self.0.lock().expect("wire").fail_post = fail;
    }
}

fn new_link() -> (LightLink<FakeConnector>, FakeConnector) {
    let connector = FakeConnector::default();
    (LightLink::new(connector.clone()), connector)
}

/// Close the current channel from the far side and let the link react.
async fn drop_channel(link: &mut LightLink<FakeConnector>, wire: &FakeConnector) -> LinkEvent {
    wire.latest_sink().disconnected(None);
    link.next_event().await.expect("disconnect event")
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_light_connects_once_then_posts() {
    let (mut link, wire) = new_link();
    assert_eq!(link.state(), ConnectionState::Disconnected);

    assert_ok!(link.update_light(true));

    assert_eq!(wire.opens(), 1);
    assert_eq!(
        wire.posted(),
        vec![LightCommand::UpdateLight { has_issues: true }]
    );
    assert_eq!(link.state(), ConnectionState::Connected);
    assert!(!link.is_confirmed(), "connected is optimistic until an ok");
}

#[tokio::test]
async fn wrappers_build_matching_commands() {
    let (mut link, wire) = new_link();
    link.set_color(30.0, 100.0, 80.0).expect("set color");
    link.turn_off().expect("off");
    link.discover().expect("discover");

    assert_eq!(
        wire.posted(),
        vec![
            LightCommand::SetColor {
                hue: 30.0,
                saturation: 100.0,
                value: 80.0
            },
            LightCommand::TurnOff,
            LightCommand::Discover,
        ]
    );
    assert_eq!(wire.opens(), 1, "later sends reuse the channel");
}

#[tokio::test]
async fn send_attempts_one_connect_then_fails_not_connected() {
    let (mut link, wire) = new_link();
    wire.set_refuse_open(true);

    let err = assert_err!(link.update_light(false));

    assert_eq!(err, LinkError::NotConnected);
    assert_eq!(wire.opens(), 1);
    assert!(wire.posted().is_empty());
    assert!(link.retry_deadline().is_none(), "a failed send never schedules retries");
}

#[tokio::test]
async fn write_failure_clears_channel_and_returns_transport_error() {
    let (mut link, wire) = new_link();
    link.connect();
    wire.set_fail_post(true);

    let err = assert_err!(link.turn_off());
    assert!(matches!(err, LinkError::Transport(_)), "got {err:?}");
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert!(!link.has_channel());
    assert_eq!(link.reconnect_attempts(), 0);

    wire.set_fail_post(false);
    assert_ok!(link.turn_off(), "next send reconnects");
    assert_eq!(wire.opens(), 2);
}

#[tokio::test]
async fn connect_is_idempotent_while_channel_exists() {
    let (mut link, wire) = new_link();
    link.connect();
    link.connect();
    link.connect();

    assert_eq!(wire.opens(), 1);
    assert_eq!(link.reconnect_attempts(), 0);
    assert_eq!(link.state(), ConnectionState::Connected);
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn error_reply_changes_nothing() {
    let (mut link, wire) = new_link();
    link.connect();
    drop_channel(&mut link, &wire).await;
    link.next_event().await.expect("retry");
    assert_eq!(link.reconnect_attempts(), 1);

    wire.latest_sink()
        .message(DeviceReply::error("No devices found"));
    match link.next_event().await {
        Some(LinkEvent::Reply(reply)) => assert!(!reply.is_ok()),
        other => panic!("expected reply, got {other:?}"),
    }
    assert_eq!(link.reconnect_attempts(), 1);
    assert_eq!(link.state(), ConnectionState::Connected);
    assert!(!link.is_confirmed());
}

#[tokio::test(start_paused = true)]
async fn ok_reply_resets_attempts_from_any_value() {
    let (mut link, wire) = new_link();
    link.connect();
    for _ in 0..2 {
        drop_channel(&mut link, &wire).await;
        link.next_event().await.expect("retry");
    }
    assert_eq!(link.reconnect_attempts(), 2);

    wire.latest_sink().message(DeviceReply::ok());
    link.next_event().await.expect("reply");

    assert_eq!(link.reconnect_attempts(), 0);
    assert!(link.is_confirmed());
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn one_disconnect_schedules_retry_after_one_second() {
    let (mut link, wire) = new_link();
    link.connect();
    let before = Instant::now();

    let event = drop_channel(&mut link, &wire).await;
    assert_eq!(
        event,
        LinkEvent::Disconnected {
            error: None,
            retry_in: Some(Duration::from_millis(1000)),
        }
    );
    assert_eq!(link.reconnect_attempts(), 1);
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert_eq!(
        link.retry_deadline(),
        Some(before + Duration::from_millis(1000))
    );

    let fired = link.next_event().await.expect("retry fires");
    assert_eq!(fired, LinkEvent::RetryFired { connected: true });
    assert!(Instant::now() >= before + Duration::from_millis(1000));
    assert_eq!(wire.opens(), 2);
    assert_eq!(link.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn ok_after_retry_resets_counter() {
    let (mut link, wire) = new_link();
    link.connect();
    drop_channel(&mut link, &wire).await;
    link.next_event().await.expect("retry fires");

    wire.latest_sink().message(DeviceReply::ok().with("action", "on"));
    let reply = link.wait_for_reply().await.expect("reply");

    assert!(reply.is_ok());
    assert_eq!(link.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn attempts_cap_at_three_and_fourth_disconnect_stays_down() {
    let (mut link, wire) = new_link();
    link.connect();

    for expected in 1..=3 {
        let event = drop_channel(&mut link, &wire).await;
        assert!(
            matches!(event, LinkEvent::Disconnected { retry_in: Some(_), .. }),
            "attempt {expected}: {event:?}"
        );
        assert_eq!(link.reconnect_attempts(), expected);
        let fired = link.next_event().await.expect("retry fires");
        assert_eq!(fired, LinkEvent::RetryFired { connected: true });
    }
    assert_eq!(wire.opens(), 4);

    let fourth = drop_channel(&mut link, &wire).await;
    assert_eq!(
        fourth,
        LinkEvent::Disconnected {
            error: None,
            retry_in: None
        }
    );
    assert_eq!(link.reconnect_attempts(), 3);
    assert!(link.retry_deadline().is_none());
    assert!(link.next_event().await.is_none(), "idle after exhaustion");
    assert_eq!(wire.opens(), 4);

    link.update_light(true).expect("a send reconnects");
    assert_eq!(wire.opens(), 5);
}

#[tokio::test(start_paused = true)]
async fn failed_retry_leaves_link_idle() {
    let (mut link, wire) = new_link();
    link.connect();
    drop_channel(&mut link, &wire).await;
    wire.set_refuse_open(true);

    let fired = link.next_event().await.expect("retry fires");
    assert_eq!(fired, LinkEvent::RetryFired { connected: false });
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert!(link.next_event().await.is_none());
}

#[tokio::test]
async fn disconnect_error_text_is_surfaced() {
    let (mut link, wire) = new_link();
    link.connect();
    wire.latest_sink()
        .disconnected(Some("Native host has exited.".to_string()));

    match link.next_event().await {
        Some(LinkEvent::Disconnected { error, .. }) => {
            assert_eq!(error.as_deref(), Some("Native host has exited."));
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Deliberate disconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deliberate_disconnect_never_counts_or_retries() {
    let (mut link, wire) = new_link();
    link.connect();

    link.disconnect();

    assert_eq!(wire.closes(), 1);
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert_eq!(link.reconnect_attempts(), 0);
    assert!(link.retry_deadline().is_none());
    assert!(link.next_event().await.is_none());
}

#[tokio::test]
async fn disconnect_when_already_disconnected_is_noop() {
    let (mut link, wire) = new_link();
    link.disconnect();
    assert_eq!(wire.closes(), 0);
    assert_eq!(link.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    let (mut link, wire) = new_link();
    link.connect();
    drop_channel(&mut link, &wire).await;
    assert!(link.retry_deadline().is_some());

    link.disconnect();

    assert!(link.retry_deadline().is_none());
    assert!(link.next_event().await.is_none());
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(wire.opens(), 1, "cancelled retry must not reopen");
    assert_eq!(link.reconnect_attempts(), 1);
}

#[tokio::test]
async fn events_from_a_closed_channel_are_ignored() {
    let (mut link, wire) = new_link();
    link.connect();
    let old = wire.sink(0);
    link.disconnect();
    link.connect();

    old.disconnected(Some("late".to_string()));
    wire.sink(1).message(DeviceReply::ok());

    let event = link.next_event().await.expect("event");
    assert!(matches!(event, LinkEvent::Reply(_)), "got {event:?}");
    assert_eq!(link.state(), ConnectionState::Connected);
    assert_eq!(link.reconnect_attempts(), 0);
    assert_ne!(old.id(), wire.sink(1).id());
}
