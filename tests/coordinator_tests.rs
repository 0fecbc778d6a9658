// Integration tests for conversation orchestration
//
// A mock media control stands in for WebRTC so the tests can observe which
// turns trigger negotiation and how agent text flows into the log and the
// paced display.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use avatar_realtime::{
    ConversationCoordinator, Direction, MediaControl, SessionControlClient, SessionIds,
    SignalingEvent, SignalingSession,
};

#[derive(Default)]
struct MockMedia {
    setup_calls: Mutex<Vec<String>>,
    streaming: AtomicBool,
}

impl MockMedia {
    fn streaming() -> Self {
        let media = Self::default();
        media.streaming.store(true, Ordering::SeqCst);
        media
    }
}

#[async_trait]
impl MediaControl for MockMedia {
    async fn setup_stream(&self, turn_message_id: &str) -> Result<()> {
        self.setup_calls
            .lock()
            .await
            .push(turn_message_id.to_string());
        Ok(())
    }

    async fn stop_stream(&self) {}

    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }
}

fn coordinator_with(media: Arc<MockMedia>) -> ConversationCoordinator {
    let ids = SessionIds::new("user-1", "agent-1", Some("sess-test".to_string()));
    let control = SessionControlClient::new("http://localhost:1");
    let (session, _events) = SignalingSession::new(ids, "ws://localhost:1".to_string(), control);

    ConversationCoordinator::new(Arc::new(session), media)
}

#[tokio::test]
async fn test_turn_completion_logs_reply_and_negotiates() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(Arc::clone(&media));

    for fragment in ["God ", "is ", "love."] {
        coordinator
            .handle_event(SignalingEvent::AgentFragment {
                text: fragment.to_string(),
            })
            .await;
    }
    coordinator
        .handle_event(SignalingEvent::TurnComplete {
            message_id: "m1".to_string(),
        })
        .await;

    let messages = coordinator.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::FromAgent);
    assert_eq!(messages[0].text, "God is love.");

    assert_eq!(*media.setup_calls.lock().await, vec!["m1".to_string()]);
}

#[tokio::test]
async fn test_trailing_fragment_belongs_to_closing_turn() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(Arc::clone(&media));

    // The final wire frame carries both the last fragment and the turn flag;
    // that fragment closes this turn, it must not leak into the next one.
    let raw_frames = [
        r#"{"mime_type":"text/plain/output","data":"Hello"}"#,
        r#"{"mime_type":"text/plain/output","data":" world"}"#,
        r#"{"turn_complete":true,"id_msg":"m1","mime_type":"text/plain/output","data":"!"}"#,
    ];
    for raw in raw_frames {
        for event in avatar_realtime::signaling::parse_frame(raw).unwrap() {
            coordinator.handle_event(event).await;
        }
    }

    let messages = coordinator.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::FromAgent);
    assert_eq!(messages[0].text, "Hello world!");
    assert_eq!(*media.setup_calls.lock().await, vec!["m1".to_string()]);
}

#[tokio::test]
async fn test_turn_without_message_id_skips_negotiation() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(Arc::clone(&media));

    coordinator
        .handle_event(SignalingEvent::AgentFragment {
            text: "Hello".to_string(),
        })
        .await;
    coordinator
        .handle_event(SignalingEvent::TurnComplete {
            message_id: String::new(),
        })
        .await;

    // The reply is still logged; only the stream setup is skipped.
    let messages = coordinator.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "Hello");

    assert!(media.setup_calls.lock().await.is_empty());
}

#[tokio::test]
async fn test_every_completed_turn_renegotiates() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(Arc::clone(&media));

    for id in ["m1", "m2", "m2"] {
        coordinator
            .handle_event(SignalingEvent::AgentFragment {
                text: "reply".to_string(),
            })
            .await;
        coordinator
            .handle_event(SignalingEvent::TurnComplete {
                message_id: id.to_string(),
            })
            .await;
    }

    // Message ids are not deduplicated; each completion replaces the stream.
    assert_eq!(
        *media.setup_calls.lock().await,
        vec!["m1".to_string(), "m2".to_string(), "m2".to_string()]
    );
}

#[tokio::test]
async fn test_transcribed_input_logged_as_user_message() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(media);

    coordinator
        .handle_event(SignalingEvent::TranscribedInput {
            text: "what is grace".to_string(),
        })
        .await;

    let messages = coordinator.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::FromUser);
    assert_eq!(messages[0].text, "what is grace");
}

#[tokio::test]
async fn test_submit_text_not_logged_when_channel_closed() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(media);

    assert!(!coordinator.submit_text("Who is God?").await);
    assert!(coordinator.messages().await.is_empty());
}

#[tokio::test]
async fn test_fragments_pace_to_display_while_streaming() {
    let media = Arc::new(MockMedia::streaming());
    let coordinator = coordinator_with(media);
    let display = coordinator.subscribe_display();

    coordinator
        .handle_event(SignalingEvent::AgentFragment {
            text: "In the beginning".to_string(),
        })
        .await;

    assert_eq!(
        display.borrow().as_deref(),
        Some("In the beginning"),
        "first fragment should display immediately while streaming"
    );

    // Queued while the first batch animates, released on completion.
    coordinator
        .handle_event(SignalingEvent::AgentFragment {
            text: " was the Word".to_string(),
        })
        .await;
    assert_eq!(display.borrow().as_deref(), Some("In the beginning"));

    coordinator.display_complete().await;
    assert_eq!(display.borrow().as_deref(), Some(" was the Word"));
}

#[tokio::test]
async fn test_display_held_back_until_stream_live() {
    let media = Arc::new(MockMedia::default());
    let coordinator = coordinator_with(Arc::clone(&media));
    let display = coordinator.subscribe_display();

    coordinator
        .handle_event(SignalingEvent::AgentFragment {
            text: "patience".to_string(),
        })
        .await;
    assert_eq!(display.borrow().as_deref(), None);

    // Stream comes up; the next pacer poke releases the fragment.
    media.streaming.store(true, Ordering::SeqCst);
    coordinator.display_complete().await;
    assert_eq!(display.borrow().as_deref(), Some("patience"));
}
