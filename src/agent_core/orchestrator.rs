//! Conversation orchestrator.
//!
//! Owns the turn lifecycle: load the session, route the input, run the RAG
//! pipeline or the agent loop, append the completed turn and persist. Turns on
//! the same session are serialized through a per-session async lock; turns on
//! different sessions run independently. A failed turn leaves the stored
//! session untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as TokioMutex;

use super::agent_loop::AgentLoop;
use super::errors::AgentError;
use super::rag_pipeline::RagPipeline;
use super::router::QueryRouter;
use super::session_store::SessionStore;
use super::types::{ConversationState, RoutingDecision, Session, Turn, TurnResult};

type SessionLock = Arc<TokioMutex<()>>;

pub struct Orchestrator {
    router: QueryRouter,
    rag: RagPipeline,
    agent: AgentLoop,
    store: Arc<dyn SessionStore>,
    session_locks: Mutex<HashMap<String, SessionLock>>,
}

impl Orchestrator {
    pub fn new(
        router: QueryRouter,
        rag: RagPipeline,
        agent: AgentLoop,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            router,
            rag,
            agent,
            store,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Process one user utterance and return the answer.
    pub async fn process_turn(&self, session_id: &str, input: &str) -> Result<String, AgentError> {
        Ok(self.run_turn(session_id, input).await?.answer)
    }

    /// Like [`process_turn`](Self::process_turn), with routing, retrieval and
    /// tool details.
    pub async fn run_turn(&self, session_id: &str, input: &str) -> Result<TurnResult, AgentError> {
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;

        let mut session = match self.store.get(session_id)? {
            Some(session) => session,
            None => {
                tracing::info!(session_id = %session_id, "new session");
                Session::new(session_id)
            }
        };

        let mut state = ConversationState::new(input, session.history.clone());
        let route = self.router.classify(input);
        tracing::info!(
            session_id = %session_id,
            route = %route,
            history_turns = state.chat_history.len(),
            "turn routed"
        );

        let outcome = self.dispatch(session_id, route, &state).await;
        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(session_id = %session_id, route = %route, error = %e, "turn failed");
                return Err(e);
            }
        };

        state.answer = result.answer.clone();
        state.context = result.context.clone();
        session.record_turn(&state.input, &state.answer, &state.context);
        self.store.put(&session)?;

        tracing::info!(
            session_id = %session_id,
            route = %route,
            turns = session.turn_count(),
            "turn completed"
        );
        result.session_id = session.id;
        Ok(result)
    }

    async fn dispatch(
        &self,
        session_id: &str,
        route: RoutingDecision,
        state: &ConversationState,
    ) -> Result<TurnResult, AgentError> {
        match route {
            RoutingDecision::Rag => {
                let outcome = self.rag.answer(state).await?;
                tracing::info!(
                    session_id = %session_id,
                    standalone = %outcome.standalone_question,
                    documents = outcome.documents.len(),
                    degraded = outcome.degraded,
                    "rag answered"
                );
                Ok(TurnResult {
                    session_id: session_id.to_string(),
                    route,
                    answer: outcome.answer,
                    context: outcome.context,
                    standalone_question: Some(outcome.standalone_question),
                    documents: outcome.documents,
                    tool_records: Vec::new(),
                    iterations: 0,
                    degraded: outcome.degraded,
                })
            }
            RoutingDecision::Tools => {
                let outcome = self.agent.run(state).await?;
                tracing::info!(
                    session_id = %session_id,
                    tool_calls = outcome.tool_records.len(),
                    iterations = outcome.iterations,
                    "agent answered"
                );
                Ok(TurnResult {
                    session_id: session_id.to_string(),
                    route,
                    answer: outcome.answer,
                    context: outcome.context,
                    standalone_question: None,
                    documents: Vec::new(),
                    tool_records: outcome.tool_records,
                    iterations: outcome.iterations,
                    degraded: false,
                })
            }
        }
    }

    /// Chat history of a session; empty if it does not exist yet.
    pub fn history(&self, session_id: &str) -> Result<Vec<Turn>, AgentError> {
        Ok(self
            .store
            .get(session_id)?
            .map(|s| s.history)
            .unwrap_or_default())
    }

    pub fn session_ids(&self) -> Result<Vec<String>, AgentError> {
        self.store.list_ids()
    }

    fn session_lock(&self, session_id: &str) -> Result<SessionLock, AgentError> {
        let mut locks = self.session_locks.lock().map_err(|e| AgentError::SessionStore {
            reason: format!("session lock table poisoned: {e}"),
        })?;
        Ok(locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
