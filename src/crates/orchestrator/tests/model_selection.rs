//! Model selection behavior through the engine.

mod common;

use common::{harness, matching_input};
use domain::payload::ConversationInput;
use domain::{ChatMessage, FeatureInput};

#[tokio::test]
async fn test_suitable_preferred_model_is_honored() {
    let h = harness().await;
    let request = h
        .engine
        .create_request(
            matching_input(),
            "user-1",
            Some("test/omni".into()),
            None,
            None,
        )
        .await
        .unwrap();
    let response = h.engine.process(request.id).await.unwrap();
    assert_eq!(response.model_id.as_deref(), Some("test/omni"));
}

#[tokio::test]
async fn test_unsuitable_preferred_model_falls_back() {
    let h = harness().await;

    // Matching needs function-calling; the preferred model lacks it.
    let request = h
        .engine
        .create_request(
            matching_input(),
            "user-1",
            Some("test/chat-only".into()),
            None,
            None,
        )
        .await
        .unwrap();
    let response = h.engine.process(request.id).await.unwrap();

    assert_eq!(response.model_id.as_deref(), Some("test/omni"));
    // The fallback is recorded, not silent.
    assert_eq!(
        h.metrics
            .counter_total("model_selection_fallbacks", &[("feature", "matching")]),
        1
    );
}

#[tokio::test]
async fn test_preferred_model_fits_when_capabilities_allow() {
    let h = harness().await;

    // Conversation only needs chat-completion, so chat-only qualifies.
    let input = FeatureInput::Conversation(ConversationInput {
        messages: vec![ChatMessage::user("hi")],
    });
    let request = h
        .engine
        .create_request(input, "user-1", Some("test/chat-only".into()), None, None)
        .await
        .unwrap();
    let response = h.engine.process(request.id).await.unwrap();
    assert_eq!(response.model_id.as_deref(), Some("test/chat-only"));
}

#[tokio::test]
async fn test_selection_is_stable_across_requests() {
    let h = harness().await;

    let mut model_ids = Vec::new();
    for _ in 0..2 {
        let request = h
            .engine
            .create_request(matching_input(), "user-1", None, None, None)
            .await
            .unwrap();
        let response = h.engine.process(request.id).await.unwrap();
        model_ids.push(response.model_id.unwrap());
    }
    assert_eq!(model_ids[0], model_ids[1]);
}
