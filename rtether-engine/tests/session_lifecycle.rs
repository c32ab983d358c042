//! Session lifecycle tests driven by mock collaborators
//!
//! These tests exercise the controller's externally observable
//! guarantees:
//! - at most one session ever reaches the forwarding engine
//! - every setup failure releases exactly what was acquired
//! - teardown runs exactly once no matter how often it is triggered
//! - a start request without an accessory touches nothing

use std::sync::Arc;
use std::time::Duration;

use rtether_engine::mock::{MockConfigurator, MockForwardingEngine, RecordingReporter};
use rtether_engine::{
    Error, ForwardingEngine, SessionConfig, SessionController, SessionState,
};
use tether_usb::mock::{fd_is_open, MockAccessoryHost};
use tether_usb::AccessoryDescriptor;

struct Harness {
    host: Arc<MockAccessoryHost>,
    configurator: Arc<MockConfigurator>,
    engine: Arc<MockForwardingEngine>,
    reporter: Arc<RecordingReporter>,
    controller: SessionController,
}

fn harness() -> Harness {
    let host = Arc::new(MockAccessoryHost::new());
    let configurator = Arc::new(MockConfigurator::new());
    let engine = Arc::new(MockForwardingEngine::new());
    let reporter = Arc::new(RecordingReporter::new());

    let controller = SessionController::new(
        SessionConfig::default(),
        host.clone(),
        host.clone(),
        configurator.clone(),
        engine.clone(),
    )
    .with_reporter(reporter.clone());

    Harness {
        host,
        configurator,
        engine,
        reporter,
        controller,
    }
}

fn peer_x() -> AccessoryDescriptor {
    AccessoryDescriptor::new("Peer-X", "10.0.0.2")
}

/// Wait until the controller settles back in `Idle`
async fn wait_for_idle(controller: &SessionController) {
    for _ in 0..100 {
        if controller.state().await == SessionState::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("controller did not return to Idle");
}

#[tokio::test]
async fn accepted_start_hands_both_descriptors_to_engine() {
    let h = harness();

    h.controller.start(Some(peer_x())).await.unwrap();

    assert_eq!(h.controller.state().await, SessionState::Running);
    assert_eq!(h.engine.start_calls(), 1);
    assert!(h.engine.is_running());

    // Both descriptors are valid, open, and distinct
    let (tun_fd, accessory_fd) = h.engine.handle_fds().unwrap();
    assert_ne!(tun_fd, accessory_fd);
    assert!(fd_is_open(tun_fd));
    assert!(fd_is_open(accessory_fd));

    // Interface configuration carried the fixed tethering parameters,
    // with the local address taken from the accessory serial
    let config = h.configurator.last_config().unwrap();
    assert_eq!(config.mtu, 1500);
    let ipv4 = config.ipv4.unwrap();
    assert_eq!(ipv4.address.to_string(), "10.0.0.2");
    assert_eq!(ipv4.prefix_len, 30);
    assert_eq!(config.routes, vec!["0.0.0.0/0".parse().unwrap()]);
    assert_eq!(config.dns_servers, vec!["8.8.8.8".parse::<std::net::IpAddr>().unwrap()]);
}

#[tokio::test]
async fn second_start_is_rejected_while_running() {
    let h = harness();

    h.controller.start(Some(peer_x())).await.unwrap();
    assert!(h.engine.is_running());

    let again = AccessoryDescriptor::new("Peer-Y", "10.0.0.6");
    let result = h.controller.start(Some(again)).await;

    assert!(matches!(result, Err(Error::AlreadyRunning)));
    // Engine state untouched: no second handoff, still running
    assert_eq!(h.engine.start_calls(), 1);
    assert!(h.engine.is_running());
    assert_eq!(h.controller.state().await, SessionState::Running);
    assert!(!h.reporter.messages().is_empty());
}

#[tokio::test]
async fn start_without_accessory_touches_nothing() {
    let h = harness();

    let result = h.controller.start(None).await;

    assert!(matches!(result, Err(Error::AccessoryUnavailable)));
    assert_eq!(h.controller.state().await, SessionState::Idle);
    // Listener never subscribed, engine never consulted for a handoff
    assert_eq!(h.host.active_subscriptions(), 0);
    assert_eq!(h.host.open_count(), 0);
    assert_eq!(h.engine.start_calls(), 0);
    assert!(!h.reporter.messages().is_empty());
}

#[tokio::test]
async fn accessory_open_failure_unwinds_cleanly() {
    let h = harness();
    h.host.fail_next_open();

    let result = h.controller.start(Some(peer_x())).await;

    assert!(matches!(result, Err(Error::AccessoryOpen(_))));
    assert_eq!(h.controller.state().await, SessionState::Idle);
    // Nothing acquired beyond the subscription, which is gone again
    assert_eq!(h.host.active_subscriptions(), 0);
    assert_eq!(h.host.unsubscribe_count(), 1);
    assert_eq!(h.configurator.establish_count(), 0);
    assert_eq!(h.engine.start_calls(), 0);
    assert!(!h.reporter.messages().is_empty());
}

#[tokio::test]
async fn interface_failure_releases_accessory_descriptor() {
    let h = harness();
    h.configurator.fail_next();

    let result = h.controller.start(Some(peer_x())).await;

    assert!(matches!(result, Err(Error::InterfaceEstablishment(_))));
    assert_eq!(h.controller.state().await, SessionState::Idle);
    // The already-opened accessory transport was closed exactly once
    assert_eq!(h.host.open_count(), 1);
    assert!(!fd_is_open(h.host.last_raw_fd()));
    // Listener unsubscribed exactly once, engine untouched
    assert_eq!(h.host.active_subscriptions(), 0);
    assert_eq!(h.host.unsubscribe_count(), 1);
    assert_eq!(h.engine.start_calls(), 0);
}

#[tokio::test]
async fn non_address_serial_fails_like_interface_establishment() {
    let h = harness();

    let descriptor = AccessoryDescriptor::new("Peer-X", "SN-12345");
    let result = h.controller.start(Some(descriptor)).await;

    assert!(matches!(result, Err(Error::InterfaceEstablishment(_))));
    assert_eq!(h.host.open_count(), 1);
    assert!(!fd_is_open(h.host.last_raw_fd()));
    assert_eq!(h.host.active_subscriptions(), 0);
    assert_eq!(h.engine.start_calls(), 0);
    assert_eq!(h.controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn detachment_stops_engine_exactly_once() {
    let h = harness();

    h.controller.start(Some(peer_x())).await.unwrap();

    // Two detach notifications in quick succession
    h.host.detach();
    h.host.detach();

    wait_for_idle(&h.controller).await;
    assert_eq!(h.engine.stop_calls(), 1);
    assert!(!h.engine.is_running());
    assert_eq!(h.host.active_subscriptions(), 0);
    assert_eq!(h.host.unsubscribe_count(), 1);
}

#[tokio::test]
async fn explicit_stop_then_detachment_is_a_noop() {
    let h = harness();

    h.controller.start(Some(peer_x())).await.unwrap();
    h.controller.stop().await;

    assert_eq!(h.controller.state().await, SessionState::Idle);
    assert_eq!(h.engine.stop_calls(), 1);

    // A late detachment event finds nothing to tear down
    h.host.detach();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.engine.stop_calls(), 1);
    assert_eq!(h.controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn stop_when_idle_is_a_noop() {
    let h = harness();

    h.controller.stop().await;
    assert_eq!(h.engine.stop_calls(), 0);
    assert_eq!(h.controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn controller_is_reentrant_after_teardown() {
    let h = harness();

    h.controller.start(Some(peer_x())).await.unwrap();
    h.controller.stop().await;
    assert_eq!(h.controller.state().await, SessionState::Idle);

    // A fresh session starts immediately after the previous one ended
    h.controller.start(Some(peer_x())).await.unwrap();
    assert_eq!(h.controller.state().await, SessionState::Running);
    assert_eq!(h.engine.start_calls(), 2);
    assert_eq!(h.host.active_subscriptions(), 1);
}

#[tokio::test]
async fn engine_handoff_failure_unwinds_cleanly() {
    let h = harness();
    h.engine.fail_next_start();

    let result = h.controller.start(Some(peer_x())).await;

    assert!(matches!(result, Err(Error::Forward(_))));
    assert_eq!(h.controller.state().await, SessionState::Idle);
    // The engine released both descriptors before returning
    assert!(!fd_is_open(h.host.last_raw_fd()));
    assert!(!fd_is_open(h.configurator.last_raw_fd()));
    assert_eq!(h.host.active_subscriptions(), 0);
    assert!(!h.engine.is_running());
}

#[tokio::test]
async fn concurrent_starts_admit_exactly_one() {
    let h = harness();
    let controller = Arc::new(h.controller);

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start(Some(peer_x())).await })
    };
    let second = {
        let controller = controller.clone();
        let descriptor = AccessoryDescriptor::new("Peer-Y", "10.0.0.6");
        tokio::spawn(async move { controller.start(Some(descriptor)).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
    let rejected = outcomes
        .iter()
        .filter(|r| matches!(r, Err(Error::AlreadyRunning)))
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(rejected, 1);
    assert_eq!(h.engine.start_calls(), 1);
}

#[tokio::test]
async fn permission_result_does_not_disturb_the_session() {
    let h = harness();

    h.controller.start(Some(peer_x())).await.unwrap();
    h.host.resolve_permission(true);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.controller.state().await, SessionState::Running);
    assert_eq!(h.engine.stop_calls(), 0);
}
