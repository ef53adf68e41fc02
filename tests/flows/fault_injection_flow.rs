/// Fault Injection Flow Tests
///
/// `block_sending` drops every outbound datagram: queries still arrive and
/// are counted, but nothing reaches the client until sending resumes.

#[path = "../common/mod.rs"]
mod common;
use common::{wait_until, Harness};

use hickory_proto::rr::RecordType;
use std::time::Duration;

#[test]
fn test_blocked_sending_counts_query_without_reply() {
    let harness = Harness::start();
    let client = harness.client();

    let connection = harness.block_on(client.connect()).unwrap();
    harness.frontend.block_sending(true).unwrap();

    let silent = harness.block_on(async {
        tokio::time::timeout(
            Duration::from_secs(1),
            connection.query("blocked.example.com", RecordType::A),
        )
        .await
    });
    assert!(silent.is_err(), "No reply may arrive while sending is blocked");
    assert!(wait_until(Duration::from_secs(2), || {
        harness.frontend.stats().queries_received == 1
    }));
    assert_eq!(harness.backend.queries(), 1);

    harness.frontend.block_sending(false).unwrap();

    let fresh = harness.client();
    let answer = harness
        .block_on(async {
            fresh
                .connect()
                .await?
                .query("resumed.example.com", RecordType::A)
                .await
        })
        .expect("Queries succeed once sending resumes");
    assert_eq!(answer.answers().len(), 1);
    assert_eq!(harness.frontend.stats().queries_received, 2);
}

#[test]
fn test_blocked_sending_prevents_handshake() {
    let harness = Harness::start();
    let client = harness.client();

    harness.frontend.block_sending(true).unwrap();
    assert!(harness.block_on(client.connect()).is_err());
    assert_eq!(harness.frontend.stats().connections_accepted, 0);

    harness.frontend.block_sending(false).unwrap();
    assert!(harness.block_on(client.connect()).is_ok());
}

#[test]
fn test_stop_completes_while_sending_is_blocked() {
    let harness = Harness::start();
    let client = harness.client();

    let _connection = harness.block_on(client.connect()).unwrap();
    harness.frontend.block_sending(true).unwrap();

    harness.frontend.stop().expect("Stop must not depend on the peer");
    assert!(!harness.frontend.is_running());

    harness.frontend.block_sending(false).unwrap();
    harness.frontend.start().unwrap();
    assert!(harness.frontend.is_running());
}
