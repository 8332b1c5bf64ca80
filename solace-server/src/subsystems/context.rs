//! Conversation context assembly
//!
//! Gathers the compressed history a follow-up generation call may see: the
//! most recent prior session summaries (never the current session's own),
//! the owner's active goals and the tail of the current exchange. Full past
//! transcripts never cross this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solace_core::config::ContextConfig;
use solace_core::models::{Goal, GoalStatus, Message, SessionSummary};
use solace_core::store::{query_records, Collection, DocumentStore, Query, StoreError};

const INLINE_SEPARATOR: &str = " | ";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub session_id: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_summaries: Vec<ContextSummary>,
    pub recent_goals: Vec<Goal>,
    pub historical_context: String,
    pub recent_exchange: Vec<Message>,
}

pub async fn assemble_context(
    store: &dyn DocumentStore,
    config: &ContextConfig,
    owner_id: &str,
    current_session_id: Option<&str>,
    current_messages: &[Message],
) -> Result<ConversationContext, StoreError> {
    let summaries: Vec<SessionSummary> = query_records(
        store,
        Collection::SessionSummaries,
        &Query::owned_by(owner_id)
            .order_by_desc("created_at")
            .limit(config.summary_fetch_limit),
    )
    .await?;

    let session_summaries: Vec<ContextSummary> = summaries
        .into_iter()
        .filter(|s| Some(s.session_id.as_str()) != current_session_id)
        .take(config.max_summaries)
        .map(|s| ContextSummary {
            summary_text: truncate_chars(&s.summary_text, config.stored_summary_chars),
            session_id: s.session_id,
            created_at: s.created_at,
        })
        .collect();

    let recent_goals: Vec<Goal> = query_records(
        store,
        Collection::Goals,
        &Query::owned_by(owner_id)
            .where_in(
                "status",
                GoalStatus::ALL.iter().filter(|s| s.is_active()).map(|s| s.as_str()),
            )
            .order_by_desc("last_mentioned")
            .limit(config.max_goals),
    )
    .await?;

    let historical_context = session_summaries
        .iter()
        .map(|s| compress(&s.summary_text, config.inline_summary_chars))
        .collect::<Vec<_>>()
        .join(INLINE_SEPARATOR);

    let skip = current_messages.len().saturating_sub(config.recent_turns);
    let recent_exchange = current_messages[skip..].to_vec();

    tracing::debug!(
        owner_id = %owner_id,
        summaries = session_summaries.len(),
        goals = recent_goals.len(),
        "Context assembled"
    );

    Ok(ConversationContext {
        session_summaries,
        recent_goals,
        historical_context,
        recent_exchange,
    })
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Fit `text` into `max_chars`, marking the cut with an ellipsis.
pub fn compress(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    format!("{}{}", truncate_chars(text, keep), ELLIPSIS)
}
