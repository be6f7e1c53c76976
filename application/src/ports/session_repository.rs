//! Session Repository port (C8, §4.8).
//!
//! Generalizes the in-memory map pattern implied by the teacher's session
//! handling (`quorum_domain::session::repository::LlmSessionRepository`,
//! scoped to one conversational turn) into an explicit CRUD-ish trait over
//! the council's append-only `CouncilSession` aggregate.

use async_trait::async_trait;
use quorum_domain::council::{CouncilSession, TraceEvent};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session already exists: {0}")]
    AlreadyExists(String),
}

/// `Create`, `Get`, `List`, `Append` (§4.8). Reads are snapshot-consistent:
/// `get` always returns the latest committed state. Backend unspecified by
/// the core; the default is an in-memory implementation in `infrastructure`.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: CouncilSession) -> Result<(), RepositoryError>;

    async fn get(&self, id: &str) -> Result<CouncilSession, RepositoryError>;

    /// Replace the stored session wholesale (the pipeline holds the
    /// authoritative in-memory copy and persists it at stage/iteration
    /// boundaries and at session end).
    async fn update(&self, session: CouncilSession) -> Result<(), RepositoryError>;

    /// Most recent sessions first, bounded to `limit`.
    async fn list(&self, limit: usize) -> Vec<CouncilSession>;

    async fn append_trace(&self, session_id: &str, event: TraceEvent) -> Result<(), RepositoryError>;

    async fn get_traces(&self, session_id: &str) -> Result<Vec<TraceEvent>, RepositoryError>;
}
