//! Pump between a turn running in the background and the transport delivering it.
//!
//! The turn pushes events onto a per-turn channel; the consumer drains it in
//! order with a short poll timeout. Dropping a [`TurnStream`] aborts the turn.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use pathfinder_core::Session;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{ChatEvent, EventSink};
use crate::turn::{Caller, ChatService};

const CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct TurnStream {
    rx: mpsc::Receiver<ChatEvent>,
    task: Option<JoinHandle<Session>>,
    poll_interval: Duration,
    done: bool,
}

impl TurnStream {
    /// Start a turn for `message` on a background task.
    pub fn spawn(
        service: Arc<ChatService>,
        mut session: Session,
        caller: Caller,
        message: String,
        poll_interval: Duration,
    ) -> Self {
        let (sink, rx) = EventSink::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            service.run_turn(&mut session, &caller, &message, &sink).await;
            session
        });
        Self {
            rx,
            task: Some(task),
            poll_interval,
            done: false,
        }
    }

    /// Next event in production order; `None` after `complete`/`error` or
    /// once the turn has finished and everything it produced was delivered.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        while !self.done {
            match tokio::time::timeout(self.poll_interval, self.rx.recv()).await {
                Ok(Some(event)) => {
                    self.done = event.is_terminal();
                    return Some(event);
                }
                Ok(None) => self.done = true,
                Err(_) => {
                    let finished = self.task.as_ref().map_or(true, JoinHandle::is_finished);
                    if finished && self.rx.is_empty() {
                        self.done = true;
                    }
                }
            }
        }
        None
    }

    /// Wait for the turn and return its session, with everything appended during the turn.
    pub async fn finish(mut self) -> Option<Session> {
        let task = self.task.take()?;
        match task.await {
            Ok(session) => Some(session),
            Err(e) => {
                debug!(error = %e, "turn task did not complete");
                None
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChatEvent> + Send {
        futures::stream::unfold(self, |mut turn| async move {
            let event = turn.next_event().await?;
            Some((event, turn))
        })
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("consumer gone, aborting turn");
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counselor::Counselor;
    use crate::intent::IntentExtractor;
    use crate::router::FastPathRouter;
    use crate::session::SessionStore;
    use crate::turn::TurnSettings;
    use futures::StreamExt;
    use pathfinder_core::MemoryCollegeData;
    use pathfinder_llm::provider::mock::ScriptedCompletion;
    use pathfinder_tool_runtime::provider::mock::MockLlmProvider;
    use pathfinder_tool_runtime::ToolRegistry;

    fn service(agent: Arc<MockLlmProvider>) -> Arc<ChatService> {
        let data = Arc::new(MemoryCollegeData::builtin().unwrap());
        let completion = ScriptedCompletion::new()
            .reply(r#"{"intent": "conversational", "needs_llm_response": true}"#);
        let router = FastPathRouter::new(IntentExtractor::new(Arc::new(completion), 0.1, 500), data);
        let counselor = Counselor::new(agent, Arc::new(ToolRegistry::new()));
        Arc::new(ChatService::new(
            router,
            counselor,
            Arc::new(SessionStore::in_memory()),
            TurnSettings::default(),
        ))
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_stop_at_complete() {
        let agent = Arc::new(MockLlmProvider::new());
        agent.queue_text("Hello! How can I help with KCET?");
        let turn = TurnStream::spawn(
            service(agent),
            Session::with_id("temp-1", None),
            Caller::anonymous(),
            "hello".into(),
            DEFAULT_POLL_INTERVAL,
        );

        let types: Vec<&'static str> = turn
            .into_stream()
            .map(|e| e.event_type())
            .collect()
            .await;
        assert_eq!(types, vec!["thinking", "chunk", "complete"]);
    }

    #[tokio::test]
    async fn finish_returns_the_updated_session() {
        let agent = Arc::new(MockLlmProvider::new());
        agent.queue_text("Hi!");
        let mut turn = TurnStream::spawn(
            service(agent),
            Session::with_id("temp-2", None),
            Caller::anonymous(),
            "hello".into(),
            DEFAULT_POLL_INTERVAL,
        );
        while turn.next_event().await.is_some() {}

        let session = turn.finish().await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "Hi!");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_cancels_the_turn() {
        let agent = Arc::new(MockLlmProvider::new());
        agent.queue_stall();
        let mut turn = TurnStream::spawn(
            service(agent.clone()),
            Session::with_id("temp-3", None),
            Caller::anonymous(),
            "hello".into(),
            DEFAULT_POLL_INTERVAL,
        );

        // The understanding step arrives, then the model stalls.
        assert_eq!(turn.next_event().await.map(|e| e.event_type()), Some("thinking"));
        let handle = turn.task.as_ref().map(|t| t.abort_handle()).unwrap();
        drop(turn);
        for _ in 0..10 {
            if handle.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(handle.is_finished());
    }
}
