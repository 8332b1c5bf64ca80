//! Follow-up question generation
//!
//! Builds a prompt from the assembled context and asks the generator for the
//! next question to put to the person. A failed call yields
//! [`FOLLOWUP_FALLBACK`]. The question is returned, not stored; callers append
//! it to the session themselves if they show it.

use serde::{Deserialize, Serialize};

use solace_core::error::Result;
use solace_core::generation::with_timeout;
use solace_core::models::{Goal, Message, MessageRole};

use crate::state::AppState;
use crate::subsystems::context::{assemble_context, ConversationContext};
use crate::subsystems::sessions::load_owned_session;

pub const FOLLOWUP_FALLBACK: &str =
    "Thank you for sharing that. How are you feeling about it right now?";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub question: String,
    pub context: ConversationContext,
}

pub async fn session_context(
    state: &AppState,
    owner_id: &str,
    session_id: &str,
) -> Result<ConversationContext> {
    let session = load_owned_session(state.store.as_ref(), owner_id, session_id).await?;
    Ok(assemble_context(
        state.store.as_ref(),
        &state.config.context,
        owner_id,
        Some(session_id),
        &session.messages,
    )
    .await?)
}

pub async fn generate_followup(state: &AppState, owner_id: &str, session_id: &str) -> Result<FollowUp> {
    let context = session_context(state, owner_id, session_id).await?;
    let prompt = followup_prompt(&context);

    let timeout = state.config.generation.timeout_seconds;
    let question = match with_timeout(timeout, state.generator.generate(&prompt)).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Follow-up generation failed, using fallback"
            );
            FOLLOWUP_FALLBACK.to_string()
        }
    };

    Ok(FollowUp { question, context })
}

pub fn followup_prompt(context: &ConversationContext) -> String {
    let mut prompt = String::from(
        "You are a warm, attentive therapist. Ask the person one short, open-ended follow-up \
         question that helps them reflect. Do not give advice or diagnoses.\n",
    );

    if !context.historical_context.is_empty() {
        prompt.push_str(&format!("\nPrevious sessions: {}\n", context.historical_context));
    }

    if !context.recent_goals.is_empty() {
        prompt.push_str("\nGoals they are working on:\n");
        for goal in &context.recent_goals {
            prompt.push_str(&goal_line(goal));
        }
    }

    prompt.push_str("\nConversation so far:\n");
    if context.recent_exchange.is_empty() {
        prompt.push_str("(nothing yet)\n");
    }
    for message in &context.recent_exchange {
        prompt.push_str(&exchange_line(message));
    }

    prompt.push_str("\nQuestion:");
    prompt
}

fn goal_line(goal: &Goal) -> String {
    format!("- {} ({})\n", goal.text, goal.status)
}

fn exchange_line(message: &Message) -> String {
    let speaker = match message.role {
        MessageRole::User => "Person",
        MessageRole::Generated => "Therapist",
    };
    format!("{}: {}\n", speaker, message.text.trim())
}
