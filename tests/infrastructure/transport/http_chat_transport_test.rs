use std::sync::Arc;
use std::time::Duration;

use bullpen::application::ports::{
    AnswerGeneratorError, ChatTransport, TransportError, UpstreamEvent,
};
use bullpen::application::services::{
    ConnectionStatus, ConsumerError, DEFAULT_FALLBACK_MESSAGE, ExchangeOutcome, StreamConsumer,
    StreamRelay,
};
use bullpen::infrastructure::transport::HttpChatTransport;
use bullpen::presentation::{AppState, create_router};
use bullpen::protocol::{ChatRequest, MAX_HISTORY_MESSAGES};

use crate::helpers::{
    FakeAnswerGenerator, GeneratorScript, closed_base_url, memory_store, snapshot, spawn_server,
};

async fn relay_url(generator: FakeAnswerGenerator) -> String {
    let relay = StreamRelay::new(
        Arc::new(generator),
        MAX_HISTORY_MESSAGES,
        String::new(),
        Duration::ZERO,
    );
    spawn_server(create_router(AppState::new(Arc::new(relay)))).await
}

#[tokio::test]
async fn given_live_relay_when_consuming_exchange_then_answer_is_stored() {
    let url = relay_url(FakeAnswerGenerator::with_events(vec![
        UpstreamEvent::Content("Gross ".to_string()),
        UpstreamEvent::Content("margin".to_string()),
        UpstreamEvent::Done,
    ]))
    .await;
    let consumer = StreamConsumer::new(
        Arc::new(HttpChatTransport::new(&url)),
        memory_store(),
        MAX_HISTORY_MESSAGES,
    );

    let outcome = consumer.send("Explain margin").await.unwrap();

    assert_eq!(outcome, ExchangeOutcome::Completed);
    let messages = snapshot(consumer.store());
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Gross margin");
    assert!(!messages[1].streaming);
}

#[tokio::test]
async fn given_relay_with_unreachable_upstream_when_consuming_then_fallback_becomes_answer() {
    let url = relay_url(FakeAnswerGenerator::unreachable()).await;
    let consumer = StreamConsumer::new(
        Arc::new(HttpChatTransport::new(&url)),
        memory_store(),
        MAX_HISTORY_MESSAGES,
    );

    let outcome = consumer.send("hello").await.unwrap();

    assert_eq!(outcome, ExchangeOutcome::Completed);
    let messages = snapshot(consumer.store());
    assert_eq!(messages[1].content, DEFAULT_FALLBACK_MESSAGE);
    assert_eq!(messages[1].sources, Some(Vec::new()));
    assert!(!messages[1].is_error);
}

#[tokio::test]
async fn given_upstream_failing_mid_answer_when_consuming_through_relay_then_partial_is_flagged() {
    let url = relay_url(FakeAnswerGenerator::new(vec![GeneratorScript::Events(vec![
        Ok(UpstreamEvent::Content("partial".to_string())),
        Err(AnswerGeneratorError::InvalidResponse("connection reset".to_string())),
    ])]))
    .await;
    let consumer = StreamConsumer::new(
        Arc::new(HttpChatTransport::new(&url)),
        memory_store(),
        MAX_HISTORY_MESSAGES,
    );

    let result = consumer.send("q").await;

    assert!(matches!(result, Err(ConsumerError::Interrupted(_))));
    let messages = snapshot(consumer.store());
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].content, "partial");
    assert!(!messages[1].is_error);
    assert!(!messages[1].streaming);
    assert!(messages[2].is_error);
}

#[tokio::test]
async fn given_relay_rejecting_request_when_opening_stream_then_status_error_is_returned() {
    let url = relay_url(FakeAnswerGenerator::with_events(Vec::new())).await;
    let transport = HttpChatTransport::new(&url);

    let result = transport.open_stream(&ChatRequest::new("", &[])).await;

    match result {
        Err(TransportError::UnexpectedStatus { status, .. }) => {
            assert_eq!(status, 400)
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected rejection"),
    }
}

#[tokio::test]
async fn given_relay_states_when_checking_health_then_connection_status_follows() {
    let healthy = relay_url(FakeAnswerGenerator::with_events(Vec::new())).await;
    let degraded = relay_url(FakeAnswerGenerator::unreachable()).await;
    let closed = closed_base_url().await;

    for (url, expected) in [
        (healthy, ConnectionStatus::Connected),
        (degraded, ConnectionStatus::Disconnected),
        (closed, ConnectionStatus::Disconnected),
    ] {
        let consumer = StreamConsumer::new(
            Arc::new(HttpChatTransport::new(&url)),
            memory_store(),
            MAX_HISTORY_MESSAGES,
        );
        assert_eq!(consumer.check_health().await, expected, "relay at {}", url);
    }
}
