//! Session lifecycle
//!
//! A session is `Open` until a SessionSummary exists for it and `Closed`
//! afterwards. Appending a message to a closed session deletes its summary
//! first, which reopens it.
//!
//! None of these operations are transactional. An append racing an
//! in-flight close can interleave so that the close writes its summary after
//! the append deleted the old one, leaving a session marked closed whose
//! summary does not cover the newest message. Callers see a definite result
//! from each call; the stored state may lag until the next append or close.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use solace_core::error::{Result, SolaceError};
use solace_core::models::{EmotionProfile, HistoryEntry, Message, MessageRole, Session, SessionState, SessionSummary};
use solace_core::scorer;
use solace_core::store::{get_record, query_records, set_record, Collection, DocumentStore, Query, StoreError, Update};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session: Session,
    pub state: SessionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendOutcome {
    pub message: Message,
    pub reopened: bool,
}

pub async fn start_session(store: &dyn DocumentStore, owner_id: &str) -> Result<Session> {
    let session = Session::new(Uuid::new_v4().to_string(), owner_id);
    set_record(store, Collection::Sessions, &session.id, &session).await?;
    tracing::info!(session_id = %session.id, owner_id = %owner_id, "Session started");
    Ok(session)
}

/// Load a session and check it belongs to `owner_id`.
pub async fn load_owned_session(
    store: &dyn DocumentStore,
    owner_id: &str,
    session_id: &str,
) -> Result<Session> {
    let session: Session = get_record(store, Collection::Sessions, session_id)
        .await?
        .ok_or_else(|| SolaceError::session_not_found(session_id))?;

    if session.owner_id != owner_id {
        tracing::warn!(session_id = %session_id, owner_id = %owner_id, "Session owner mismatch");
        return Err(SolaceError::AccessDenied {
            kind: "session",
            id: session_id.to_string(),
        });
    }
    Ok(session)
}

/// Whether a session is closed. The only place that decides it.
pub async fn session_state(
    store: &dyn DocumentStore,
    session_id: &str,
) -> std::result::Result<SessionState, StoreError> {
    let summary: Option<SessionSummary> =
        get_record(store, Collection::SessionSummaries, session_id).await?;
    Ok(match summary {
        Some(s) => SessionState::Closed {
            summarized_at: s.created_at,
        },
        None => SessionState::Open,
    })
}

/// Explicit `Closed -> Open` transition.
async fn reopen(store: &dyn DocumentStore, session_id: &str) -> Result<()> {
    store.delete(Collection::SessionSummaries, session_id).await?;
    tracing::info!(session_id = %session_id, "Session reopened by new message");
    Ok(())
}

pub async fn append_message(
    store: &dyn DocumentStore,
    owner_id: &str,
    session_id: &str,
    text: &str,
    role: MessageRole,
) -> Result<AppendOutcome> {
    if text.trim().is_empty() {
        return Err(SolaceError::InvalidInput("message text is empty".to_string()));
    }

    load_owned_session(store, owner_id, session_id).await?;

    let reopened = session_state(store, session_id).await?.is_closed();
    if reopened {
        reopen(store, session_id).await?;
    }

    let message = match role {
        MessageRole::User => Message::user(text, owner_id),
        MessageRole::Generated => Message::generated(text),
    };

    store
        .update(
            Collection::Sessions,
            session_id,
            Update::Append {
                field: "messages".to_string(),
                value: serde_json::to_value(&message).map_err(StoreError::from)?,
            },
        )
        .await?;

    tracing::debug!(session_id = %session_id, role = message.role.as_str(), "Message appended");
    Ok(AppendOutcome { message, reopened })
}

pub async fn get_session(
    store: &dyn DocumentStore,
    owner_id: &str,
    session_id: &str,
) -> Result<SessionView> {
    let session = load_owned_session(store, owner_id, session_id).await?;
    let state = session_state(store, session_id).await?;
    Ok(SessionView { session, state })
}

/// The owner's sessions, newest first.
pub async fn list_history(store: &dyn DocumentStore, owner_id: &str) -> Result<Vec<HistoryEntry>> {
    let sessions: Vec<Session> = query_records(
        store,
        Collection::Sessions,
        &Query::owned_by(owner_id).order_by_desc("created_at"),
    )
    .await?;

    let summarized: HashMap<String, DateTime<Utc>> = query_records::<SessionSummary>(
        store,
        Collection::SessionSummaries,
        &Query::owned_by(owner_id),
    )
    .await?
    .into_iter()
    .map(|s| (s.session_id, s.created_at))
    .collect();

    Ok(sessions
        .into_iter()
        .map(|s| {
            let state = match summarized.get(&s.id) {
                Some(at) => SessionState::Closed { summarized_at: *at },
                None => SessionState::Open,
            };
            HistoryEntry {
                message_count: s.messages.len(),
                session_id: s.id,
                created_at: s.created_at,
                status: state.label().to_string(),
            }
        })
        .collect())
}

/// Live emotion analysis of a session. No writes.
pub async fn analyze_session(
    store: &dyn DocumentStore,
    owner_id: &str,
    session_id: &str,
) -> Result<EmotionProfile> {
    let session = load_owned_session(store, owner_id, session_id).await?;
    Ok(scorer::score(&session.messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::models::GoalTrackingResult;
    use solace_core::MemoryStore;

    async fn write_summary(store: &MemoryStore, session: &Session) {
        let summary = SessionSummary {
            session_id: session.id.clone(),
            owner_id: session.owner_id.clone(),
            summary_text: "closed".to_string(),
            analytics: scorer::score(&[]),
            goal_tracking: GoalTrackingResult::default(),
            created_at: chrono::Utc::now(),
        };
        set_record(store, Collection::SessionSummaries, &session.id, &summary)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_and_append() {
        let store = MemoryStore::new();
        let session = start_session(&store, "u1").await.unwrap();
        assert!(session.messages.is_empty());

        let outcome = append_message(&store, "u1", &session.id, "hello", MessageRole::User)
            .await
            .unwrap();
        assert!(!outcome.reopened);
        assert_eq!(outcome.message.author_id.as_deref(), Some("u1"));

        let outcome = append_message(&store, "u1", &session.id, "hi there", MessageRole::Generated)
            .await
            .unwrap();
        assert!(outcome.message.author_id.is_none());

        let view = get_session(&store, "u1", &session.id).await.unwrap();
        assert_eq!(view.session.messages.len(), 2);
        assert_eq!(view.session.messages[0].text, "hello");
        assert_eq!(view.state, SessionState::Open);
    }

    #[tokio::test]
    async fn test_missing_and_foreign_sessions() {
        let store = MemoryStore::new();
        let session = start_session(&store, "u1").await.unwrap();

        let err = get_session(&store, "u1", "nope").await.unwrap_err();
        assert_eq!(err.code(), "not_found");

        let err = append_message(&store, "u2", &session.id, "hello", MessageRole::User)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "access_denied");

        let err = append_message(&store, "u1", &session.id, "  ", MessageRole::User)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[tokio::test]
    async fn test_append_reopens_closed_session() {
        let store = MemoryStore::new();
        let session = start_session(&store, "u1").await.unwrap();
        write_summary(&store, &session).await;
        assert!(session_state(&store, &session.id).await.unwrap().is_closed());

        let outcome = append_message(&store, "u1", &session.id, "one more thing", MessageRole::User)
            .await
            .unwrap();
        assert!(outcome.reopened);
        assert_eq!(session_state(&store, &session.id).await.unwrap(), SessionState::Open);
        assert_eq!(store.count(Collection::SessionSummaries).await, 0);
    }

    #[tokio::test]
    async fn test_history_is_owner_scoped_with_status() {
        let store = MemoryStore::new();
        let first = start_session(&store, "u1").await.unwrap();
        let second = start_session(&store, "u1").await.unwrap();
        start_session(&store, "u2").await.unwrap();
        write_summary(&store, &first).await;

        let history = list_history(&store, "u1").await.unwrap();
        assert_eq!(history.len(), 2);
        let status_of = |id: &str| {
            history
                .iter()
                .find(|h| h.session_id == id)
                .map(|h| h.status.clone())
                .unwrap()
        };
        assert_eq!(status_of(&first.id), "summarized");
        assert_eq!(status_of(&second.id), "open");
    }

    #[tokio::test]
    async fn test_analyze_session_scores_messages() {
        let store = MemoryStore::new();
        let session = start_session(&store, "u1").await.unwrap();
        append_message(&store, "u1", &session.id, "I feel so lonely!", MessageRole::User)
            .await
            .unwrap();

        let profile = analyze_session(&store, "u1", &session.id).await.unwrap();
        assert_eq!(profile.message_analysis.user_messages, 1);
        assert_eq!(profile.avg_intensity, 7.0);
        assert_eq!(profile.emotion_percentages[&solace_core::models::Emotion::Lonely], 1.0);
    }
}
