use super::*;

#[tokio::test]
async fn fetch_failure_reports_and_reclaims() {
    let t = create_test_relay_with(Config::default(), MockFetcher::unsupported(), MockProcessor::new())
        .await;
    let mut events = t.relay.subscribe();
    let job = t.submit(UserId(7), ChatId(7), "https://example.com/v/1").await;

    t.select(UserId(7), &start_token(Variant::Best, &job.id)).await;

    let edits = t.transport.edits();
    assert!(edits.last().unwrap().starts_with("Failed: unsupported source"));
    assert!(t.transport.deliveries().is_empty());
    assert!(t.relay.state.jobs.get(&job.id).await.is_none());
    assert!(!t.work_root().join(job.id.as_str()).exists());
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, Event::JobFailed { .. }))
    );
}

#[tokio::test]
async fn transmit_failure_reports_and_reclaims() {
    let t = create_test_relay().await;
    t.transport.fail_artifact_sends();
    let job = t.submit(UserId(7), ChatId(7), "https://example.com/v/1").await;

    t.select(UserId(7), &start_token(Variant::Best, &job.id)).await;

    let edits = t.transport.edits();
    assert!(edits.last().unwrap().starts_with("Failed: delivery rejected"));
    assert!(t.relay.state.jobs.get(&job.id).await.is_none());
    assert!(!t.work_root().join(job.id.as_str()).exists());
}

#[tokio::test]
async fn tagging_failure_still_delivers_the_untagged_artifact() {
    let mut config = Config::default();
    config.tags.title = Some("Better Title".to_string());
    let t = create_test_relay_with(config, MockFetcher::ok(), MockProcessor::failing_tags()).await;
    let job = t.submit(UserId(7), ChatId(7), "https://example.com/v/1").await;

    t.select(UserId(7), &start_token(Variant::Best, &job.id)).await;

    match t.transport.deliveries().first() {
        Some(TransportCall::Document { content, .. }) => assert_eq!(content, b"artifact"),
        other => panic!("expected a document delivery, got {other:?}"),
    }
    assert!(!t.transport.edits().iter().any(|e| e.starts_with("Failed")));
}

#[tokio::test]
async fn long_failure_detail_is_truncated_for_the_requester() {
    let t = create_test_relay_with(
        Config::default(),
        MockFetcher::failing("x".repeat(500)),
        MockProcessor::new(),
    )
    .await;
    let job = t.submit(UserId(7), ChatId(7), "https://example.com/v/1").await;

    t.select(UserId(7), &start_token(Variant::Best, &job.id)).await;

    let edits = t.transport.edits();
    let notice = edits.last().unwrap();
    assert!(notice.starts_with("Failed: xxx"));
    assert_eq!(notice.chars().count(), "Failed: ".chars().count() + 200);
}
