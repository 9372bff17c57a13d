//! Event bus routing: topic scoping, wildcard, and no-subscriber behavior.

use cellbook::channel::bus::WILDCARD_TOPIC;
use cellbook::channel::events::DepsValidateResponsePayload;
use cellbook::channel::{EventBus, Notification};

use super::test_helpers::{assert_silent, recv};

fn reinstall_signal() -> Notification {
    Notification::DepsValidateResponse(DepsValidateResponsePayload { packages: None })
}

#[tokio::test]
async fn subscribers_only_see_their_own_topic() {
    let bus = EventBus::new();
    let mut rx_a = bus.subscribe("session:a");
    let mut rx_b = bus.subscribe("session:b");

    bus.publish("a", reinstall_signal());

    let envelope = recv(&mut rx_a).await;
    assert_eq!(envelope.topic, "session:a");
    assert_silent(&mut rx_b, 300).await;
}

#[tokio::test]
async fn wildcard_subscription_sees_every_session() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe(WILDCARD_TOPIC);

    bus.publish("a", reinstall_signal());
    bus.publish("b", reinstall_signal());

    let first = recv(&mut rx).await;
    let second = recv(&mut rx).await;
    assert_eq!(first.topic, "session:a");
    assert_eq!(second.topic, "session:b");
}

#[tokio::test]
async fn publishing_without_subscribers_is_a_silent_noop() {
    let bus = EventBus::new();
    bus.publish("nobody", reinstall_signal());

    // Late joiners never see past notifications.
    let mut rx = bus.subscribe("session:nobody");
    assert_silent(&mut rx, 300).await;
}

#[tokio::test]
async fn wildcard_and_exact_subscribers_both_receive_one_copy() {
    let bus = EventBus::new();
    let mut exact = bus.subscribe("session:a");
    let mut wild = bus.subscribe(WILDCARD_TOPIC);

    bus.publish("a", reinstall_signal());

    assert_eq!(recv(&mut exact).await.topic, "session:a");
    assert_eq!(recv(&mut wild).await.topic, "session:a");
    assert_silent(&mut exact, 200).await;
    assert_silent(&mut wild, 200).await;
}
