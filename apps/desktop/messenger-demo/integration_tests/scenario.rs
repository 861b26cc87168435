use messenger_demo::scenario::{ScenarioReport, run};
use messenger_demo::session::SessionInfo;

use messenger_core::config::ChannelNames;
use messenger_core::transport::memory::MemoryBridge;
use messenger_core::transport::ws::{WsClient, WsHost};

// ============================================================================
// The scripted demo conversation, over both bridges
// ============================================================================

fn expected_report() -> ScenarioReport {
    ScenarioReport {
        counter_seen: vec![0, 1],
        sum: 10,
        fault: String::from("exploded: boom"),
    }
}

/// **VALUE**: Runs the whole demo conversation in process.
///
/// **BUG THIS CATCHES**: Would catch if the typed contract, handlers and callbacks
/// drift apart (a key renamed on one side only).
#[tokio::test]
async fn given_memory_bridge_when_running_scenario_then_report_matches() {
    // GIVEN: An in-process bridge
    let bridge = MemoryBridge::new();

    // WHEN: Running the scenario
    let report = run(bridge.host(), bridge.connect(), &ChannelNames::default())
        .await
        .expect("scenario");

    // THEN: Counter broadcast, sum and fault all observed
    assert_eq!(report, expected_report());
    assert_eq!(
        bridge.host().listener_count("Messenger::Message::ClientEvent"),
        0,
        "Scenario should dispose its registrations"
    );
}

/// **VALUE**: Runs the same conversation with custom channel names.
#[tokio::test]
async fn given_custom_channels_when_running_scenario_then_report_matches() {
    let bridge = MemoryBridge::new();
    let channels = ChannelNames {
        client_event: String::from("Demo::ClientEvent"),
        service_response: String::from("Demo::ServiceResponse"),
        invoke_namespace: String::from("Demo::Invoke"),
    };

    let report = run(bridge.host(), bridge.connect(), &channels)
        .await
        .expect("scenario");

    assert_eq!(report, expected_report());
}

/// **VALUE**: Runs the demo conversation over a real localhost socket.
#[tokio::test]
async fn given_ws_bridge_when_running_scenario_then_report_matches() {
    // GIVEN: Host on a free port and an authenticated renderer
    let session = SessionInfo::new(0, "scenario-token");
    let host = WsHost::bind(session.port(), session.auth_token().clone())
        .await
        .expect("bind");
    let session = session.with_port(host.local_addr().port());
    let renderer = WsClient::connect(&session.url().expect("url"), session.auth_token())
        .await
        .expect("connect");

    // WHEN: Running the scenario
    let report = run(host.clone(), renderer, &ChannelNames::default())
        .await
        .expect("scenario");

    // THEN: Same observations as in process
    assert_eq!(report, expected_report());
}
