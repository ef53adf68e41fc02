/// Transport Limits Flow Tests
///
/// Stream cap, request-size bound and idle timeout as seen by a client.

#[path = "../common/mod.rs"]
mod common;
use common::{wait_until, DohConnection, Harness};

use ferrous_doh_infrastructure::dns::message::DnsMessage;
use futures::future::join_all;
use hickory_proto::rr::RecordType;
use http::StatusCode;
use std::time::{Duration, Instant};

const BACKEND_DELAY: Duration = Duration::from_millis(400);

/// Run `count` concurrent queries on `connection`, returning when each finished.
async fn timed_queries(
    connection: &DohConnection,
    prefix: &str,
    count: usize,
) -> anyhow::Result<Vec<Duration>> {
    let started = Instant::now();
    let queries = (0..count).map(|i| async move {
        connection
            .query(&format!("{}{}.example.com", prefix, i), RecordType::A)
            .await
            .map(|_| started.elapsed())
    });
    join_all(queries).await.into_iter().collect()
}

#[test]
fn test_stream_beyond_limit_waits_for_free_slot() {
    const LIMIT: usize = 2;
    let harness = Harness::start_with(BACKEND_DELAY, |limits| {
        limits.max_streams_bidi = LIMIT as u64;
    });
    let client = harness.client();

    let elapsed = harness
        .block_on(async {
            let connection = client.connect().await?;
            let started = Instant::now();

            let queries = (0..=LIMIT).map(|i| {
                let connection = &connection;
                async move {
                    connection
                        .query(&format!("slot{}.example.com", i), RecordType::A)
                        .await
                        .map(|_| started.elapsed())
                }
            });
            let mut elapsed = Vec::new();
            for result in join_all(queries).await {
                elapsed.push(result?);
            }

            // The connection survives and serves further streams
            connection.query("after.example.com", RecordType::A).await?;
            anyhow::Ok(elapsed)
        })
        .unwrap();

    let fastest = *elapsed.iter().min().unwrap();
    let slowest = *elapsed.iter().max().unwrap();
    assert!(fastest < BACKEND_DELAY * 2, "first streams served concurrently");
    assert!(
        slowest >= BACKEND_DELAY * 2 - Duration::from_millis(50),
        "stream {} must wait for a slot, finished after {:?}",
        LIMIT + 1,
        slowest
    );

    let stats = harness.frontend.stats();
    assert_eq!(stats.connections_accepted, 1);
    assert_eq!(stats.queries_received, LIMIT as u64 + 2);
}

#[test]
fn test_streams_within_limit_run_concurrently() {
    let harness = Harness::start_with(BACKEND_DELAY, |limits| {
        limits.max_streams_bidi = 4;
    });
    let client = harness.client();

    let elapsed = harness
        .block_on(async {
            let connection = client.connect().await?;
            let started = Instant::now();
            let queries = (0..4).map(|i| {
                let connection = &connection;
                async move {
                    connection
                        .query(&format!("par{}.example.com", i), RecordType::A)
                        .await
                }
            });
            for result in join_all(queries).await {
                result?;
            }
            anyhow::Ok(started.elapsed())
        })
        .unwrap();

    assert!(elapsed < BACKEND_DELAY * 2, "took {:?}", elapsed);
}

#[test]
fn test_oversize_post_body_is_refused() {
    let harness = Harness::start_with(Duration::ZERO, |limits| {
        limits.max_buffer_size = 512;
    });
    let client = harness.client();

    let response = harness
        .block_on(async { client.connect().await?.post(&[0u8; 2048]).await })
        .unwrap();

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(harness.frontend.stats().queries_received, 0);
}

#[test]
fn test_idle_timeout_applies_to_new_connections() {
    let harness = Harness::start();
    let client = harness.client();

    let long_lived = harness.block_on(client.connect()).unwrap();

    harness.frontend.set_max_idle_timeout(300).unwrap();
    let short_lived = harness.block_on(client.connect()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        harness.frontend.stats().alive_connections == 2
    }));

    assert!(wait_until(Duration::from_secs(3), || short_lived.is_closed()));
    assert!(!long_lived.is_closed(), "established connection keeps its timeout");
    assert!(wait_until(Duration::from_secs(2), || {
        harness.frontend.stats().alive_connections == 1
    }));

    let query = DnsMessage::build_query("example.com", RecordType::A).unwrap();
    let response = harness.block_on(long_lived.post(&query)).unwrap();
    assert_eq!(response.status, StatusCode::OK);
}

#[test]
fn test_raised_stream_limit_reaches_live_connection() {
    let harness = Harness::start_with(BACKEND_DELAY, |limits| {
        limits.max_streams_bidi = 1;
    });
    let client = harness.client();

    let connection = harness.block_on(client.connect()).unwrap();
    harness
        .block_on(connection.query("warmup.example.com", RecordType::A))
        .unwrap();

    harness.frontend.set_max_streams_bidi(3).unwrap();
    // MAX_STREAMS travels with the next packet; a round trip delivers it
    harness
        .block_on(connection.query("credit.example.com", RecordType::A))
        .unwrap();

    let elapsed = harness
        .block_on(timed_queries(&connection, "raised", 3))
        .unwrap();
    for took in &elapsed {
        assert!(*took < BACKEND_DELAY * 2, "streams still serialized: {:?}", elapsed);
    }
}

#[test]
fn test_lowered_stream_limit_applies_to_new_connections() {
    let harness = Harness::start_with(BACKEND_DELAY, |limits| {
        limits.max_streams_bidi = 4;
    });
    let client = harness.client();

    let established = harness.block_on(client.connect()).unwrap();
    harness.frontend.set_max_streams_bidi(1).unwrap();
    let fresh = harness.block_on(client.connect()).unwrap();

    let (kept, lowered) = harness.block_on(async {
        let kept = timed_queries(&established, "kept", 2).await?;
        let lowered = timed_queries(&fresh, "lowered", 2).await?;
        anyhow::Ok((kept, lowered))
    })
    .unwrap();

    assert!(
        kept.iter().all(|took| *took < BACKEND_DELAY * 2),
        "established connection keeps its credit: {:?}",
        kept
    );
    let slowest = *lowered.iter().max().unwrap();
    assert!(
        slowest >= BACKEND_DELAY * 2 - Duration::from_millis(50),
        "new connection must queue behind one stream, finished after {:?}",
        slowest
    );
}

#[test]
fn test_knob_changes_leave_in_flight_request_intact() {
    let harness = Harness::start_with(Duration::from_millis(800), |_| {});
    let client = harness.client();
    let connection = harness.block_on(client.connect()).unwrap();

    let answer = std::thread::scope(|scope| {
        let frontend = &harness.frontend;
        scope.spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            frontend.set_max_idle_timeout(300).unwrap();
            frontend.set_max_buffer_size(512).unwrap();
            frontend.set_max_streams_bidi(1).unwrap();
        });
        harness.block_on(connection.query("inflight.example.com", RecordType::A))
    })
    .expect("In-flight query survives knob changes");

    assert_eq!(answer.answers().len(), 1);
    assert_eq!(harness.frontend.limits().max_streams_bidi, 1);
    assert!(!connection.is_closed());
}
