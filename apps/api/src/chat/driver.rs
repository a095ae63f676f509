//! Drives one accepted turn from transport to session.
//!
//! The session lock is taken per transition and never held across an await
//! on the transport, so snapshots stay readable while a reply streams in.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chat::message::APOLOGY_TEXT;
use crate::chat::session::{ChatSession, PendingTurn, TurnOutcome};
use crate::chat::transport::ChatTransport;

/// Progress notifications for a live view of the turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A piece of the assistant reply, in arrival order.
    Fragment { text: String },
    /// The reply finished; `text` is the full assistant message.
    Done { text: String },
    /// The turn failed; `text` is the apology now shown in its place.
    Failed { text: String },
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Fragment { .. } => "fragment",
            ChatEvent::Done { .. } => "done",
            ChatEvent::Failed { .. } => "error",
        }
    }
}

/// Accepts `input` and waits for the turn to finish. `None` when the
/// submission was ignored (blank, or a request already in flight).
///
/// The turn itself runs on its own task, so dropping this future (a visitor
/// disconnecting mid-request) never strands the session out of `Idle`.
pub async fn submit(
    session: Arc<Mutex<ChatSession>>,
    transport: Arc<dyn ChatTransport>,
    input: &str,
) -> Option<TurnOutcome> {
    let turn = session.lock().await.begin_turn(input)?;
    match spawn_turn(session, transport, turn, None).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Chat turn task ended abnormally: {e}");
            Some(TurnOutcome::Failed)
        }
    }
}

/// Runs `turn` on a detached task. It completes whether or not anyone
/// awaits the handle.
pub fn spawn_turn(
    session: Arc<Mutex<ChatSession>>,
    transport: Arc<dyn ChatTransport>,
    turn: PendingTurn,
    events: Option<mpsc::Sender<ChatEvent>>,
) -> JoinHandle<TurnOutcome> {
    tokio::spawn(async move { run_turn(&session, transport.as_ref(), turn, events).await })
}

/// Sends `turn` and applies the reply to `session`, which must be the
/// session that produced it. Always leaves the session `Idle`.
pub async fn run_turn(
    session: &Mutex<ChatSession>,
    transport: &dyn ChatTransport,
    turn: PendingTurn,
    events: Option<mpsc::Sender<ChatEvent>>,
) -> TurnOutcome {
    let notify = |event: ChatEvent| {
        let events = events.clone();
        async move {
            if let Some(tx) = events {
                // The viewer may have gone away; the turn still completes.
                let _ = tx.send(event).await;
            }
        }
    };

    let mut stream = match transport.send(turn.into()).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Chat request via {} failed: {e}", transport.name());
            let outcome = session.lock().await.fail();
            notify(ChatEvent::Failed {
                text: APOLOGY_TEXT.to_string(),
            })
            .await;
            return outcome;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                let applied = session.lock().await.push_fragment(&fragment);
                if applied {
                    notify(ChatEvent::Fragment { text: fragment }).await;
                }
            }
            Err(e) => {
                warn!("Chat stream via {} broke off: {e}", transport.name());
                let outcome = session.lock().await.fail();
                notify(ChatEvent::Failed {
                    text: APOLOGY_TEXT.to_string(),
                })
                .await;
                return outcome;
            }
        }
    }

    let outcome = session.lock().await.complete();
    match &outcome {
        TurnOutcome::Answered(text) => {
            debug!("Chat reply complete ({} chars)", text.len());
            notify(ChatEvent::Done { text: text.clone() }).await;
        }
        TurnOutcome::Failed => {
            warn!("Chat stream via {} ended without text", transport.name());
            notify(ChatEvent::Failed {
                text: APOLOGY_TEXT.to_string(),
            })
            .await;
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{ChatMessage, Role};
    use crate::chat::session::Phase;
    use crate::chat::transport::testing::{Reply, ScriptedTransport};

    const GREETING: &str = "Hi! I'm the assistant.";

    fn mounted() -> Arc<Mutex<ChatSession>> {
        Arc::new(Mutex::new(ChatSession::mount(GREETING)))
    }

    #[tokio::test]
    async fn test_blank_submission_issues_no_request() {
        let session = mounted();
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        assert!(submit(session.clone(), transport.clone(), "   ").await.is_none());
        assert!(transport.requests().await.is_empty());
        assert_eq!(session.lock().await.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_single_fragment_reply() {
        let session = mounted();
        let transport = Arc::new(ScriptedTransport::new(vec![Reply::Fragments(vec!["Dhaka."])]));

        let outcome = submit(session.clone(), transport, "Where is he based?").await;
        assert_eq!(outcome, Some(TurnOutcome::Answered("Dhaka.".to_string())));

        let session = session.lock().await;
        assert_eq!(
            session.messages(),
            &[
                ChatMessage::assistant(GREETING),
                ChatMessage::user("Where is he based?"),
                ChatMessage::assistant("Dhaka."),
            ]
        );
        assert!(session.input_enabled());
    }

    #[tokio::test]
    async fn test_multi_fragment_reply_is_one_message() {
        let session = mounted();
        let transport = ScriptedTransport::new(vec![Reply::Fragments(vec!["Hel", "lo ", "there"])]);
        let (tx, mut rx) = mpsc::channel(16);

        let turn = session.lock().await.begin_turn("hi").unwrap();
        run_turn(&session, &transport, turn, Some(tx)).await;

        let session = session.lock().await;
        let assistants: Vec<_> = session
            .messages()
            .iter()
            .skip(2)
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].text, "Hello there");

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names, vec!["fragment", "fragment", "fragment", "done"]);
    }

    #[tokio::test]
    async fn test_request_carries_message_and_prior_history() {
        let session = mounted();
        let transport = Arc::new(ScriptedTransport::new(vec![
            Reply::Fragments(vec!["First answer"]),
            Reply::Fragments(vec!["Second answer"]),
        ]));
        submit(session.clone(), transport.clone(), "one").await;
        submit(session.clone(), transport.clone(), "two").await;

        let requests = transport.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].message, "two");
        assert_eq!(
            requests[1].history,
            vec![
                ChatMessage::assistant(GREETING),
                ChatMessage::user("one"),
                ChatMessage::assistant("First answer"),
            ]
        );
    }

    #[tokio::test]
    async fn test_backend_failure_yields_single_apology() {
        let session = mounted();
        let transport = Arc::new(ScriptedTransport::new(vec![Reply::Fail]));

        let outcome = submit(session.clone(), transport, "hi").await;
        assert_eq!(outcome, Some(TurnOutcome::Failed));

        let session = session.lock().await;
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2], ChatMessage::assistant(APOLOGY_TEXT));
        assert!(session.input_enabled());
    }

    #[tokio::test]
    async fn test_stream_abort_replaces_partial_reply() {
        let session = mounted();
        let transport = ScriptedTransport::new(vec![Reply::FailAfter(vec!["Part", "ial"])]);
        let (tx, mut rx) = mpsc::channel(16);

        let turn = session.lock().await.begin_turn("hi").unwrap();
        let outcome = run_turn(&session, &transport, turn, Some(tx)).await;
        assert_eq!(outcome, TurnOutcome::Failed);

        let session = session.lock().await;
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[2].text, APOLOGY_TEXT);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(ChatEvent::Failed {
                text: APOLOGY_TEXT.to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_submit_while_in_flight_is_noop_until_resolved() {
        let session = mounted();
        let (feed, rx) = mpsc::channel(4);
        let transport = Arc::new(ScriptedTransport::new(vec![
            Reply::Channel(rx),
            Reply::Fragments(vec!["again"]),
        ]));

        let turn = session.lock().await.begin_turn("first").unwrap();
        let worker = spawn_turn(session.clone(), transport.clone(), turn, None);

        feed.send(Ok("stream".to_string())).await.unwrap();
        // Wait until the first fragment has landed.
        loop {
            if session.lock().await.phase() == Phase::Streaming {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(submit(session.clone(), transport.clone(), "second").await.is_none());
        assert_eq!(transport.requests().await.len(), 1);

        drop(feed);
        assert_eq!(
            worker.await.unwrap(),
            TurnOutcome::Answered("stream".to_string())
        );

        let outcome = submit(session.clone(), transport.clone(), "second").await;
        assert_eq!(outcome, Some(TurnOutcome::Answered("again".to_string())));
        assert_eq!(transport.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_submit_still_finishes_turn() {
        let session = mounted();
        let (feed, rx) = mpsc::channel(4);
        let transport = Arc::new(ScriptedTransport::new(vec![Reply::Channel(rx)]));

        let caller = tokio::spawn(submit(session.clone(), transport.clone(), "hi"));
        while !session.lock().await.is_in_flight() {
            tokio::task::yield_now().await;
        }
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        feed.send(Ok("late answer".to_string())).await.unwrap();
        drop(feed);

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while session.lock().await.is_in_flight() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let session = session.lock().await;
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(
            session.messages().last(),
            Some(&ChatMessage::assistant("late answer"))
        );
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(ChatEvent::Fragment {
            text: "Hel".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "fragment", "text": "Hel"}));
    }
}
