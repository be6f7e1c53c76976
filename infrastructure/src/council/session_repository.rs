//! In-memory session repository (C8, §4.8), the default backend named by
//! the port's own doc comment. Generalizes the teacher's
//! `HashMap`-per-conversation session-state pattern to the council's
//! `CouncilSession` aggregate, guarded by a `tokio::sync::RwLock` since
//! reads (`get`, `list`) vastly outnumber writes (`update`, `append_trace`)
//! across a session's lifetime.

use async_trait::async_trait;
use quorum_application::ports::session_repository::{RepositoryError, SessionRepository};
use quorum_domain::council::{CouncilSession, TraceEvent};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Entry {
    session: CouncilSession,
    traces: Vec<TraceEvent>,
}

pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: CouncilSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(RepositoryError::AlreadyExists(session.id.clone()));
        }
        sessions.insert(session.id.clone(), Entry { session, traces: Vec::new() });
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<CouncilSession, RepositoryError> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|e| e.session.clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update(&self, session: CouncilSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&session.id).ok_or_else(|| RepositoryError::NotFound(session.id.clone()))?;
        entry.session = session;
        Ok(())
    }

    async fn list(&self, limit: usize) -> Vec<CouncilSession> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<&CouncilSession> = sessions.values().map(|e| &e.session).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.into_iter().take(limit).cloned().collect()
    }

    async fn append_trace(&self, session_id: &str, event: TraceEvent) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(session_id).ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))?;
        entry.traces.push(event);
        Ok(())
    }

    async fn get_traces(&self, session_id: &str) -> Result<Vec<TraceEvent>, RepositoryError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|e| e.traces.clone())
            .ok_or_else(|| RepositoryError::NotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::council::{Complexity, CouncilPlan, EventType, IterationStrategy, VotingMethod};

    fn plan() -> CouncilPlan {
        CouncilPlan {
            complexity: Complexity::Simple,
            domain: "general".into(),
            reasoning: "test".into(),
            council_size: 3,
            members: vec![],
            voting_method: VotingMethod::Majority,
            allow_iterations: false,
            max_iterations: 1,
            iteration_strategy: IterationStrategy::Refine,
        }
    }

    fn session(id: &str) -> CouncilSession {
        CouncilSession::new(id, "Q?", plan(), 0)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemorySessionRepository::new();
        repo.create(session("s1")).await.unwrap();
        let fetched = repo.get("s1").await.unwrap();
        assert_eq!(fetched.id, "s1");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let repo = InMemorySessionRepository::new();
        repo.create(session("s1")).await.unwrap();
        let err = repo.create(session("s1")).await.unwrap_err();
        assert_eq!(err, RepositoryError::AlreadyExists("s1".to_string()));
    }

    #[tokio::test]
    async fn get_missing_session_errors() {
        let repo = InMemorySessionRepository::new();
        assert_eq!(repo.get("missing").await.unwrap_err(), RepositoryError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn update_replaces_stored_session() {
        let repo = InMemorySessionRepository::new();
        let mut s = session("s1");
        repo.create(s.clone()).await.unwrap();
        s.status = quorum_domain::council::SessionStatus::Completed;
        repo.update(s).await.unwrap();
        assert_eq!(repo.get("s1").await.unwrap().status, quorum_domain::council::SessionStatus::Completed);
    }

    #[tokio::test]
    async fn append_and_get_traces_round_trip() {
        let repo = InMemorySessionRepository::new();
        repo.create(session("s1")).await.unwrap();
        repo.append_trace("s1", TraceEvent::new(1, "s1", EventType::SessionStart, 0)).await.unwrap();
        repo.append_trace("s1", TraceEvent::new(2, "s1", EventType::SessionEnd, 10)).await.unwrap();
        let traces = repo.get_traces("s1").await.unwrap();
        assert_eq!(traces.len(), 2);
    }

    #[tokio::test]
    async fn list_orders_most_recent_first_and_respects_limit() {
        let repo = InMemorySessionRepository::new();
        repo.create(CouncilSession::new("old", "Q?", plan(), 0)).await.unwrap();
        repo.create(CouncilSession::new("new", "Q?", plan(), 1000)).await.unwrap();
        let listed = repo.list(1).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "new");
    }
}
