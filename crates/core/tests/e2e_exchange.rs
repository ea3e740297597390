//! E2E tests for the exchange engine.
//!
//! Each test drives a full process against a scripted connector:
//! - Happy path: negotiation, then transfer, then completion
//! - Negotiation and transfer failures
//! - User cancellation mid-negotiation
//! - Registry fan-out across several endpoints
//! - Malformed poll responses

mod common;

use common::*;
use dpp_core::edc::MockConnector;
use dpp_protocol::ProcessState;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_happy_path_completes_the_process() {
    let connector = MockConnector::new()
        .with_negotiation_states("neg-1", &["REQUESTED", "NEGOTIATING", "CONFIRMED"])
        .with_transfer_states("tra-1", &["REQUESTED", "STARTED", "COMPLETED"]);
    let (_dir, connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let record = engine.status(&process.id).unwrap();
    assert_eq!(record.state, ProcessState::Completed);

    // The journal carries the two terminal entries, negotiation first.
    let negotiation = record.get_history("negotiation").expect("negotiation entry");
    let transfer = record.get_history("transfer").expect("transfer entry");
    assert_eq!(negotiation.status, "CONFIRMED");
    assert_eq!(transfer.status, "COMPLETED");
    assert!(negotiation.updated <= transfer.updated);
    assert!(negotiation.started <= transfer.started);

    // The transfer was started against the negotiated agreement.
    let requests = connector.transfer_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].contract_id, "agreement-neg-1");
    assert_eq!(requests[0].asset_id, "urn:uuid:a1");
    assert_eq!(
        requests[0].private_properties.receiver_http_endpoint,
        format!("https://backend/endpoint/{}", process.id)
    );
}

#[tokio::test]
async fn test_negotiation_request_carries_the_first_policy() {
    let connector = MockConnector::new()
        .with_negotiation_states("neg-1", &["CONFIRMED"])
        .with_transfer_states("tra-1", &["COMPLETED"]);
    let (_dir, connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let requests = connector.negotiation_requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].offer.offer_id, "pol-1");
    assert_eq!(requests[0].offer.asset_id, "urn:uuid:a1");
    assert!(requests[0].offer.policy.id.is_none());
    assert_eq!(requests[0].counter_party_address, TEST_ENDPOINT);
    assert_eq!(requests[0].counter_party_id, TEST_BPN);
}

#[tokio::test]
async fn test_negotiation_failure_marks_the_process_failed() {
    let connector =
        MockConnector::new().with_negotiation_states("neg-1", &["REQUESTED", "TERMINATED"]);
    let (_dir, connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let record = engine.status(&process.id).unwrap();
    assert_eq!(record.state, ProcessState::Failed);
    assert_eq!(record.get_history("negotiation-failed").unwrap().status, "FAILED");

    // Exactly one entry names the failing step.
    let failed: Vec<_> = record
        .history
        .values()
        .filter(|entry| entry.status == "FAILED")
        .collect();
    assert_eq!(failed.len(), 1);

    // No transfer request was ever issued.
    assert!(connector.transfer_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transfer_failure_preserves_the_negotiation_entry() {
    let connector = MockConnector::new()
        .with_negotiation_states("neg-1", &["REQUESTED", "CONFIRMED"])
        .with_transfer_states("tra-1", &["REQUESTED", "STARTED", "ERROR"]);
    let (_dir, _connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let record = engine.status(&process.id).unwrap();
    assert_eq!(record.state, ProcessState::Failed);
    assert_eq!(record.get_history("transfer-failed").unwrap().status, "FAILED");
    assert_eq!(record.get_history("negotiation").unwrap().status, "CONFIRMED");
}

#[tokio::test]
async fn test_terminate_mid_negotiation() {
    // The negotiation never reaches a terminal state on its own.
    let connector =
        MockConnector::new().with_negotiation_states("neg-1", &["REQUESTED", "NEGOTIATING"]);
    let (_dir, connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();

    // Let the driver observe at least the first poll, then cancel.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let cancelled_at = Instant::now();
    engine.terminate(&process.id).unwrap();
    engine.join(&process.id).await;

    // The driver returns within roughly one poll interval.
    assert!(cancelled_at.elapsed() < Duration::from_millis(250));

    let record = engine.status(&process.id).unwrap();
    assert_eq!(record.state, ProcessState::Terminated);
    assert!(connector.transfer_requests.lock().unwrap().is_empty());

    // The last persisted negotiation entry reflects the last observed
    // remote state.
    let negotiation = record.get_history("negotiation").expect("negotiation entry");
    assert_eq!(negotiation.status, "NEGOTIATING");
}

#[tokio::test]
async fn test_registry_fan_out() {
    let connector = MockConnector::new()
        .with_transfer_states_for("r1", &["REQUESTED", "STARTED", "COMPLETED"])
        .with_transfer_states_for("r2", &["REQUESTED", "TERMINATED"])
        .with_transfer_states_for("r3", &["COMPLETED"]);
    let (_dir, connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    let endpoints = vec![
        ("r1".to_string(), test_dtr("r1")),
        ("r2".to_string(), test_dtr("r2")),
        ("r3".to_string(), test_dtr("r3")),
    ];
    engine.start_registry_fetch(&process.id, endpoints).unwrap();
    engine.join(&process.id).await;

    // A terminated registry endpoint never fails the process.
    let record = engine.status(&process.id).unwrap();
    assert_eq!(record.state, ProcessState::Running);

    assert_eq!(record.get_history("dtr-r1-transfer").unwrap().status, "OK");
    assert_eq!(record.get_history("dtr-r3-transfer").unwrap().status, "OK");
    assert_eq!(
        record.get_history("dtr-r2-transfer-incomplete").unwrap().status,
        "INCOMPLETE"
    );

    // One transfer per endpoint, each with a demultiplexing receiver path.
    let requests = connector.transfer_requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    for endpoint_id in ["r1", "r2", "r3"] {
        assert!(requests.iter().any(|request| {
            request.private_properties.receiver_http_endpoint
                == format!("https://backend/endpoint/{}/{endpoint_id}", process.id)
        }));
    }
}

#[tokio::test]
async fn test_malformed_poll_response_fails_without_further_polls() {
    let connector = MockConnector::new()
        .with_negotiation_bodies(vec![serde_json::json!({ "@id": "neg-1" })]);
    let (_dir, connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let record = engine.status(&process.id).unwrap();
    assert_eq!(record.state, ProcessState::Failed);
    assert_eq!(record.get_history("negotiation-failed").unwrap().status, "FAILED");
    assert_eq!(connector.negotiation_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_journal_replay_reproduces_the_process() {
    let connector = MockConnector::new()
        .with_negotiation_states("neg-1", &["REQUESTED", "CONFIRMED"])
        .with_transfer_states("tra-1", &["STARTED", "COMPLETED"]);
    let (_dir, _connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let in_memory = engine.status(&process.id).unwrap();
    let replayed = engine.store().load(&process.id).unwrap();
    assert_eq!(replayed, in_memory);

    // Every journal file matches the entry mirrored on the record.
    for step in engine.store().journal().list_steps(&process.id).unwrap() {
        let entry = engine.store().journal().read(&process.id, &step).unwrap().unwrap();
        assert_eq!(in_memory.get_history(&step), Some(&entry));
    }
}

#[tokio::test]
async fn test_timestamps_are_monotone() {
    let connector = MockConnector::new()
        .with_negotiation_states("neg-1", &["REQUESTED", "NEGOTIATING", "CONFIRMED"])
        .with_transfer_states("tra-1", &["REQUESTED", "COMPLETED"]);
    let (_dir, _connector, engine) = engine_with(connector);

    let process = engine.create_process(TEST_ENDPOINT, TEST_BPN).unwrap();
    engine.start_exchange(&process.id, TEST_BPN, test_dataset()).unwrap();
    engine.join(&process.id).await;

    let record = engine.status(&process.id).unwrap();
    assert!(record.created <= record.modified);
    for entry in record.history.values() {
        assert!(entry.started <= entry.updated);
        assert!(record.modified >= entry.updated);
    }
}
