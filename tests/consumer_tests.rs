use anyhow::Result;
use kinesis_shard_reader::client::KinesisClientError;
use kinesis_shard_reader::test::mocks::{MockStreamClient, SplittingDecoder};
use kinesis_shard_reader::test::TestUtils;
use kinesis_shard_reader::{
    IteratorStart, PassthroughDecoder, Position, ReaderError, ShardExit,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

mod common;

use common::{tracking_key, wait_for, TestContext};

#[tokio::test(start_paused = true)]
async fn test_stored_position_is_last_fully_handled_record() -> Result<()> {
    let ctx = TestContext::new();
    ctx.handler.set_delay(Duration::from_millis(100));
    ctx.client
        .mock_get_records(Ok((
            TestUtils::create_test_records(5),
            Some("iterator-2".to_string()),
        )))
        .await;

    let handle = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone());

    // Land in the middle of the third record's handler call
    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.request_stop();
    let exit = handle.join().await?;

    assert_eq!(exit, ShardExit::Stopped);

    let handled = ctx.handler.positions();
    assert!(!handled.is_empty() && handled.len() < 5);
    assert_eq!(
        ctx.store.stored(&tracking_key("shard-1")).await,
        handled.last().map(|p| Position::new(p.as_str()))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_first_iterator_request_depends_on_stored_position() -> Result<()> {
    let fresh = TestContext::new();
    fresh.client.mock_get_records(Ok((vec![], None))).await;
    fresh
        .consumer("shard-1", PassthroughDecoder::default())
        .start(fresh.handler.clone())
        .join()
        .await?;
    assert_eq!(fresh.client.iterator_requests(), vec![IteratorStart::TrimHorizon]);

    let resumed = TestContext::new();
    resumed.store.seed(&tracking_key("shard-1"), "49590338271490256608559692538361571095921575989136588898").await;
    resumed.client.mock_get_records(Ok((vec![], None))).await;
    resumed
        .consumer("shard-1", PassthroughDecoder::default())
        .start(resumed.handler.clone())
        .join()
        .await?;
    assert_eq!(
        resumed.client.iterator_requests(),
        vec![IteratorStart::AfterPosition(Position::new(
            "49590338271490256608559692538361571095921575989136588898"
        ))]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_expired_iterator_reacquires_from_stored_position() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((
            TestUtils::create_test_records(2),
            Some("iterator-2".to_string()),
        )))
        .await;
    ctx.client.mock_expired_iterator().await;
    ctx.client
        .mock_get_records(Ok((TestUtils::create_test_records_from(3, 1), None)))
        .await;

    let exit = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone())
        .join()
        .await?;

    assert_eq!(exit, ShardExit::Closed);
    assert_eq!(
        ctx.client.iterator_requests(),
        vec![
            IteratorStart::TrimHorizon,
            IteratorStart::AfterPosition(Position::new("2")),
        ]
    );
    assert_eq!(
        ctx.client.get_records_iterators(),
        vec!["mock-iterator", "iterator-2", "mock-iterator"]
    );
    assert_eq!(ctx.handler.positions(), vec!["1", "2", "3"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fetches_are_at_least_one_second_apart() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((
            TestUtils::create_test_records(3),
            Some("iterator-2".to_string()),
        )))
        .await;
    ctx.client.mock_expired_iterator().await;

    let handle = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone());

    tokio::time::sleep(Duration::from_millis(5500)).await;
    handle.request_stop();
    handle.join().await?;

    let times = ctx.client.get_records_times();
    assert!(times.len() >= 5, "expected steady polling, got {} fetches", times.len());
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_secs(1),
            "fetches {:?} apart",
            pair[1] - pair[0]
        );
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_batch_does_not_delay_next_fetch_further() -> Result<()> {
    let ctx = TestContext::new();
    ctx.handler.set_delay(Duration::from_millis(1500));
    ctx.client
        .mock_get_records(Ok((
            TestUtils::create_test_records(1),
            Some("iterator-2".to_string()),
        )))
        .await;
    ctx.client.mock_get_records(Ok((vec![], None))).await;

    ctx.consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone())
        .join()
        .await?;

    let times = ctx.client.get_records_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] >= Duration::from_millis(1500));
    assert!(times[1] - times[0] < Duration::from_millis(1600));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_missing_next_iterator_closes_shard() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((TestUtils::create_test_records(2), None)))
        .await;

    let exit = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone())
        .join()
        .await?;

    assert_eq!(exit, ShardExit::Closed);
    assert_eq!(ctx.client.iterator_requests().len(), 1);
    assert_eq!(ctx.client.get_records_calls(), 1);
    assert_eq!(
        ctx.store.stored(&tracking_key("shard-1")).await,
        Some(Position::new("2"))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_handler_order_matches_record_order() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((TestUtils::create_test_records(10), None)))
        .await;

    ctx.consumer("shard-1", SplittingDecoder)
        .start(ctx.handler.clone())
        .join()
        .await?;

    let expected: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
    assert_eq!(ctx.handler.positions(), expected);

    let events: Vec<String> = ctx.handler.handled().into_iter().map(|e| e.event).collect();
    let expected: Vec<String> = (1..=10).map(|i| format!("data-{}", i)).collect();
    assert_eq!(events, expected);

    let history = ctx.store.set_history().await;
    let expected: Vec<Position> = (1..=10).map(|i| Position::new(i.to_string())).collect();
    assert_eq!(history, expected);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_position_persisted_after_all_events_of_a_record() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((
            vec![
                TestUtils::create_test_record("1", b"a,b,c"),
                TestUtils::create_test_record("2", b""),
                TestUtils::create_test_record("3", b"d"),
            ],
            None,
        )))
        .await;

    ctx.consumer("shard-1", SplittingDecoder)
        .start(ctx.handler.clone())
        .join()
        .await?;

    let handled = ctx.handler.handled();
    let events: Vec<&str> = handled.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(events, vec!["a", "b", "c", "d"]);
    assert!(handled.iter().all(|e| e.schema_name == "part"));

    // A record that decodes into no events still advances the position
    assert_eq!(
        ctx.store.set_history().await,
        vec![Position::new("1"), Position::new("2"), Position::new("3")]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_rate_limit_sleep() -> Result<()> {
    let ctx = TestContext::new();

    let handle = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone());

    wait_for(|| ctx.client.get_records_calls() == 1, Duration::from_secs(1)).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let requested = tokio::time::Instant::now();
    handle.request_stop();
    let exit = handle.join().await?;

    assert_eq!(exit, ShardExit::Stopped);
    assert_eq!(ctx.client.get_records_calls(), 1);
    assert!(requested.elapsed() < Duration::from_millis(100));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_fetch_waits_for_in_flight_call() -> Result<()> {
    let ctx = TestContext::with_client(MockStreamClient::new_with_delay(Duration::from_secs(2)));
    ctx.client
        .mock_get_records(Ok((
            TestUtils::create_test_records(3),
            Some("iterator-2".to_string()),
        )))
        .await;

    let handle = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone());

    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.request_stop();
    assert!(!handle.is_finished());

    let exit = handle.join().await?;

    assert_eq!(exit, ShardExit::Stopped);
    assert_eq!(ctx.client.get_records_calls(), 1);
    // The fetched batch is left for the next run
    assert_eq!(ctx.handler.handled_count(), 0);
    assert_eq!(ctx.store.stored(&tracking_key("shard-1")).await, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_decode_failure_terminates_consumer() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((
            vec![
                TestUtils::create_test_record("1", b"ok"),
                TestUtils::create_test_record("2", b"!"),
            ],
            Some("iterator-2".to_string()),
        )))
        .await;

    let result = ctx
        .consumer("shard-1", SplittingDecoder)
        .start(ctx.handler.clone())
        .join()
        .await;

    match result {
        Err(ReaderError::Decode { position, .. }) => assert_eq!(position, "2"),
        other => panic!("expected decode error, got {:?}", other),
    }
    assert_eq!(
        ctx.store.stored(&tracking_key("shard-1")).await,
        Some(Position::new("1"))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_persist_failure_is_retried() -> Result<()> {
    let ctx = TestContext::new();
    ctx.store.mock_set(Err(anyhow::anyhow!("throttled"))).await;
    ctx.client
        .mock_get_records(Ok((TestUtils::create_test_records(2), None)))
        .await;

    let exit = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .start(ctx.handler.clone())
        .join()
        .await?;

    assert_eq!(exit, ShardExit::Closed);
    assert_eq!(ctx.store.set_calls().await, 3);
    assert_eq!(
        ctx.store.stored(&tracking_key("shard-1")).await,
        Some(Position::new("2"))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_iterator_failure_is_surfaced() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_iterator(Err(KinesisClientError::ResourceNotFound(
            "shard-9".to_string(),
        )))
        .await;

    let result = ctx
        .consumer("shard-9", PassthroughDecoder::default())
        .start(ctx.handler.clone())
        .join()
        .await;

    assert!(matches!(
        result,
        Err(ReaderError::GetIteratorFailed { ref shard_id, .. }) if shard_id == "shard-9"
    ));
    assert_eq!(ctx.client.get_records_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_run_on_current_task() -> Result<()> {
    let ctx = TestContext::new();
    ctx.client
        .mock_get_records(Ok((TestUtils::create_test_records(1), None)))
        .await;
    let (_tx, rx) = tokio::sync::watch::channel(false);

    let exit = ctx
        .consumer("shard-1", PassthroughDecoder::default())
        .run(ctx.handler.clone(), rx)
        .await?;

    assert_eq!(exit, ShardExit::Closed);
    assert_eq!(ctx.handler.positions(), vec!["1"]);
    Ok(())
}
