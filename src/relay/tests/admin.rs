use super::*;

#[tokio::test]
async fn ban_requires_the_admin_role() {
    let t = create_test_relay().await;

    let err = t.relay.ban_user(UserId(5), UserId(7)).await.unwrap_err();

    assert!(matches!(err, Error::Admission(AdmissionError::NotAdmin)));
}

#[tokio::test]
async fn ban_and_unban_flip_the_stored_flag() {
    let mut config = Config::default();
    config.gate.admins = vec![UserId(1)];
    let t = create_test_relay_with(config, MockFetcher::ok(), MockProcessor::new()).await;
    let mut events = t.relay.subscribe();

    t.relay.ban_user(UserId(1), UserId(7)).await.unwrap();
    assert!(t.relay.db.is_banned(UserId(7)).await.unwrap());

    t.relay.unban_user(UserId(1), UserId(7)).await.unwrap();
    assert!(!t.relay.db.is_banned(UserId(7)).await.unwrap());

    let seen = drain(&mut events);
    assert!(
        seen.iter()
            .any(|e| matches!(e, Event::UserBanned { user } if *user == UserId(7)))
    );
    assert!(
        seen.iter()
            .any(|e| matches!(e, Event::UserUnbanned { user } if *user == UserId(7)))
    );
}

#[tokio::test]
async fn broadcast_reaches_every_recorded_user_and_counts_failures() {
    let mut config = Config::default();
    config.gate.admins = vec![UserId(1)];
    let t = create_test_relay_with(config, MockFetcher::ok(), MockProcessor::new()).await;
    t.relay.handle_start(UserId(2), ChatId(2)).await.unwrap();
    t.relay.handle_start(UserId(3), ChatId(3)).await.unwrap();
    t.transport.fail_sends_to(ChatId(3));
    let mut events = t.relay.subscribe();

    let report = t.relay.broadcast(UserId(1), "maintenance tonight").await.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    let copies = t
        .transport
        .sent_texts()
        .iter()
        .filter(|text| text.as_str() == "maintenance tonight")
        .count();
    assert_eq!(copies, 1);
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, Event::BroadcastFinished { report } if report.failed == 1))
    );
}

#[tokio::test]
async fn broadcast_requires_the_admin_role() {
    let t = create_test_relay().await;

    let err = t.relay.broadcast(UserId(5), "hi").await.unwrap_err();

    assert!(matches!(err, Error::Admission(AdmissionError::NotAdmin)));
}

#[tokio::test]
async fn user_count_tracks_distinct_users() {
    let t = create_test_relay().await;
    t.relay.handle_start(UserId(2), ChatId(2)).await.unwrap();
    t.relay.handle_start(UserId(2), ChatId(2)).await.unwrap();
    t.relay.handle_start(UserId(3), ChatId(3)).await.unwrap();

    assert_eq!(t.relay.user_count().await.unwrap(), 2);
}
