//! Integration tests driving the relay end to end through mock
//! collaborators. Each test builds a fresh relay on a tempdir; see
//! `test_helpers` for the mock transport, fetcher, and processor.

mod admin;
mod failures;

use std::sync::atomic::Ordering;

use crate::config::Config;
use crate::error::{AdmissionError, Error};
use crate::relay::test_helpers::{
    MockFetcher, MockProcessor, TransportCall, cancel_token, create_test_relay,
    create_test_relay_with, start_token,
};
use crate::transport::ButtonAction;
use crate::types::{ChannelId, ChatId, Event, JobState, UserId, Variant};

/// Drain every event already delivered to this subscriber.
fn drain(events: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
