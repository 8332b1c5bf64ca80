//! Goal extraction and reconciliation
//!
//! Asks the text generator for goal statements in a session's user messages,
//! then folds them into the owner's goal ledger:
//!
//! 1. Extract: prompt the generator, pull the outermost `[...]` out of the reply
//!    and parse it as a list of `{goal, status, category, confidence}`.
//! 2. Filter: drop candidates under the confidence threshold or with no text.
//! 3. Match: compare against existing goals (oldest first). A goal matches when
//!    either text contains the other, or they share enough words. The first
//!    match wins, so the result depends on ledger order.
//! 4. Update or create: a match records the mention and may move status
//!    forward; no match creates a new goal.
//!
//! Goal tracking is best-effort. Any failure becomes a zero-progress
//! [`GoalTrackingResult`] carrying the error text.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use solace_core::config::AnalyticsConfig;
use solace_core::generation::{with_timeout, GenerationError, TextGenerator};
use solace_core::models::{Goal, GoalCandidate, GoalTrackingResult, Message};
use solace_core::store::{query_records, set_record, Collection, DocumentStore, Query, StoreError};

#[derive(Error, Debug)]
pub enum GoalTrackingError {
    #[error("goal extraction failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("goal ledger unavailable: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct GoalTracker {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn TextGenerator>,
    timeout_seconds: u64,
    confidence_threshold: f64,
    token_overlap: usize,
}

impl GoalTracker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn TextGenerator>,
        analytics: &AnalyticsConfig,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            store,
            generator,
            timeout_seconds,
            confidence_threshold: analytics.goal_confidence_threshold,
            token_overlap: analytics.goal_token_overlap,
        }
    }

    /// Extract goals from `messages` and reconcile them with `owner_id`'s
    /// ledger. Never fails.
    pub async fn reconcile(
        &self,
        session_id: &str,
        messages: &[Message],
        owner_id: &str,
    ) -> GoalTrackingResult {
        match self.try_reconcile(session_id, messages, owner_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    owner_id = %owner_id,
                    error = %e,
                    "Goal tracking failed"
                );
                GoalTrackingResult::failed(e)
            }
        }
    }

    async fn try_reconcile(
        &self,
        session_id: &str,
        messages: &[Message],
        owner_id: &str,
    ) -> Result<GoalTrackingResult, GoalTrackingError> {
        let user_text = user_text(messages);
        if user_text.is_empty() {
            return Ok(GoalTrackingResult::default());
        }

        let reply = with_timeout(
            self.timeout_seconds,
            self.generator.generate(&goal_extraction_prompt(&user_text)),
        )
        .await?;

        let candidates = filter_candidates(parse_goal_candidates(&reply), self.confidence_threshold);
        if candidates.is_empty() {
            tracing::debug!(session_id = %session_id, "No goals detected");
            return Ok(GoalTrackingResult::default());
        }

        let existing: Vec<Goal> = query_records(
            self.store.as_ref(),
            Collection::Goals,
            &Query::owned_by(owner_id).order_by_asc("created_at"),
        )
        .await?;

        let plan = reconcile_candidates(
            existing,
            &candidates,
            session_id,
            owner_id,
            Utc::now(),
            self.token_overlap,
        );

        for goal in plan.created.iter().chain(plan.updated.iter()) {
            set_record(self.store.as_ref(), Collection::Goals, &goal.id, goal).await?;
        }

        tracing::info!(
            session_id = %session_id,
            owner_id = %owner_id,
            processed = candidates.len(),
            created = plan.created.len(),
            updated = plan.updated.len(),
            "Goals reconciled"
        );

        Ok(GoalTrackingResult {
            goals_processed: candidates.len(),
            new_goals: plan.created.len(),
            updated_goals: plan.updated.len(),
            error: None,
        })
    }
}

fn user_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.is_user())
        .map(|m| m.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn goal_extraction_prompt(user_text: &str) -> String {
    format!(
        "Read what a person said during a therapy session and list any personal goals they \
         mention. Respond with a JSON array only. Each element must have the fields \
         \"goal\" (short description), \"status\" (one of \"imagined\", \"started\", \"done\", \
         \"abandoned\"), \"category\" (for example health, career, relationships, personal) and \
         \"confidence\" (0 to 1). Respond with [] if there are none.\n\n{}\n\nGoals:",
        user_text
    )
}

/// Parse the generator's reply. Prose before and after the array is ignored,
/// including prose with brackets of its own; an unparseable reply means no goals.
pub fn parse_goal_candidates(reply: &str) -> Vec<GoalCandidate> {
    let Ok(array_start) = Regex::new(r"\[\s*[\{\]]") else {
        return Vec::new();
    };

    let mut last_error = None;
    for start in array_start.find_iter(reply).map(|m| m.start()) {
        let Some(end) = matching_bracket(reply, start) else {
            continue;
        };
        match serde_json::from_str::<Vec<serde_json::Value>>(&reply[start..=end]) {
            Ok(items) => {
                return items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect()
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => tracing::warn!(error = %e, "Goal extraction reply was not valid JSON"),
        None => tracing::warn!("Goal extraction reply contained no JSON array"),
    }
    Vec::new()
}

/// Byte index of the `]` closing the `[` at `open`. Brackets inside JSON
/// strings do not count.
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn filter_candidates(candidates: Vec<GoalCandidate>, threshold: f64) -> Vec<GoalCandidate> {
    candidates
        .into_iter()
        .filter(|c| c.confidence >= threshold && !c.goal.trim().is_empty())
        .collect()
}

/// Case-folded containment in either direction, or at least `min_overlap`
/// shared words.
pub fn goals_match(candidate: &str, existing: &str, min_overlap: usize) -> bool {
    let candidate = candidate.trim().to_lowercase();
    let existing = existing.trim().to_lowercase();
    if candidate.is_empty() || existing.is_empty() {
        return false;
    }
    if candidate.contains(&existing) || existing.contains(&candidate) {
        return true;
    }

    let candidate_words: HashSet<&str> = candidate.split_whitespace().collect();
    let existing_words: HashSet<&str> = existing.split_whitespace().collect();
    candidate_words.intersection(&existing_words).count() >= min_overlap
}

/// Goals to write after reconciliation.
#[derive(Debug, Default, PartialEq)]
pub struct ReconcilePlan {
    pub created: Vec<Goal>,
    pub updated: Vec<Goal>,
}

enum Entry {
    Existing { goal: Goal, touched: bool },
    Created(Goal),
}

impl Entry {
    fn goal_mut(&mut self) -> &mut Goal {
        match self {
            Entry::Existing { goal, .. } | Entry::Created(goal) => goal,
        }
    }
}

pub fn reconcile_candidates(
    existing: Vec<Goal>,
    candidates: &[GoalCandidate],
    session_id: &str,
    owner_id: &str,
    now: DateTime<Utc>,
    min_overlap: usize,
) -> ReconcilePlan {
    let mut ledger: Vec<Entry> = existing
        .into_iter()
        .map(|goal| Entry::Existing { goal, touched: false })
        .collect();

    for candidate in candidates {
        let matched = ledger
            .iter_mut()
            .find(|entry| match entry {
                Entry::Existing { goal, .. } | Entry::Created(goal) => {
                    goals_match(&candidate.goal, &goal.text, min_overlap)
                }
            });

        match matched {
            Some(entry) => {
                if let Entry::Existing { touched, .. } = entry {
                    *touched = true;
                }
                let goal = entry.goal_mut();
                goal.session_mentions.insert(session_id.to_string());
                goal.last_mentioned = now;
                let next = candidate.status();
                if goal.status.accepts(next) {
                    tracing::debug!(goal_id = %goal.id, from = %goal.status, to = %next, "Goal status advanced");
                    goal.status = next;
                }
            }
            None => ledger.push(Entry::Created(Goal {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                text: candidate.goal.trim().to_string(),
                status: candidate.status(),
                category: candidate.category(),
                confidence_score: candidate.confidence.clamp(0.0, 1.0),
                created_at: now,
                last_mentioned: now,
                session_mentions: BTreeSet::from([session_id.to_string()]),
            })),
        }
    }

    let mut plan = ReconcilePlan::default();
    for entry in ledger {
        match entry {
            Entry::Existing { goal, touched: true } => plan.updated.push(goal),
            Entry::Existing { .. } => {}
            Entry::Created(goal) => plan.created.push(goal),
        }
    }
    plan
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingGenerator, ScriptedGenerator};
    use solace_core::models::GoalStatus;
    use solace_core::MemoryStore;

    fn goal(id: &str, text: &str, status: GoalStatus) -> Goal {
        let at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Goal {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            text: text.to_string(),
            status,
            category: "health".to_string(),
            confidence_score: 0.8,
            created_at: at,
            last_mentioned: at,
            session_mentions: BTreeSet::from(["s0".to_string()]),
        }
    }

    fn candidate(text: &str, status: &str, confidence: f64) -> GoalCandidate {
        GoalCandidate {
            goal: text.to_string(),
            status: Some(status.to_string()),
            category: Some("health".to_string()),
            confidence,
        }
    }

    fn tracker(store: Arc<MemoryStore>, generator: Arc<dyn TextGenerator>) -> GoalTracker {
        GoalTracker::new(store, generator, &AnalyticsConfig::default(), 5)
    }

    // ========================================================================
    // TEST 1: Parsing tolerates prose around the array
    // ========================================================================

    #[test]
    fn test_parse_extracts_outermost_array() {
        let reply = "Sure! Here are the goals:\n[{\"goal\": \"run a 5k\", \"status\": \"started\", \
                     \"category\": \"health\", \"confidence\": 0.9}]\nLet me know [if] that helps.";
        let parsed = parse_goal_candidates(reply);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].goal, "run a 5k");
        assert_eq!(parsed[0].status(), GoalStatus::Started);

        let reply = "Here you go:\n[{\"goal\": \"run a 5k\", \"status\": \"started\", \"confidence\": 0.9}]\nThanks";
        assert_eq!(parse_goal_candidates(reply).len(), 1);
    }

    #[test]
    fn test_parse_skips_bracketed_prose() {
        let reply = "Based on [the session], I found: [{\"goal\": \"call my sister [weekly]\", \
                     \"status\": \"imagined\", \"confidence\": 0.8}]\nNote: [status] values are estimates.";
        let parsed = parse_goal_candidates(reply);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].goal, "call my sister [weekly]");

        let nested = "```json\n[{\"goal\": \"save money\", \"tags\": [\"a\", \"b\"], \"confidence\": 0.7}]\n```";
        assert_eq!(parse_goal_candidates(nested).len(), 1);
    }

    #[test]
    fn test_parse_failure_means_no_goals() {
        assert!(parse_goal_candidates("I could not find any goals.").is_empty());
        assert!(parse_goal_candidates("[not json]").is_empty());
        assert!(parse_goal_candidates("[]").is_empty());
    }

    #[test]
    fn test_filter_drops_low_confidence_and_blank() {
        let kept = filter_candidates(
            vec![
                candidate("sleep more", "imagined", 0.6),
                candidate("drink water", "imagined", 0.59),
                candidate("   ", "started", 0.95),
            ],
            0.6,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].goal, "sleep more");
    }

    // ========================================================================
    // TEST 2: Matching heuristic
    // ========================================================================

    #[test]
    fn test_goals_match_rules() {
        assert!(goals_match("Improve sleep quality", "improve sleep", 2));
        assert!(goals_match("sleep", "get more sleep", 2));
        assert!(goals_match("call my mother weekly", "call my sister", 2));
        assert!(!goals_match("learn guitar", "learn spanish", 2));
        assert!(!goals_match("", "anything", 2));
    }

    // ========================================================================
    // TEST 3: Reconciliation moves status forward only
    // ========================================================================

    #[test]
    fn test_existing_goal_advances_instead_of_duplicating() {
        let now = Utc::now();
        let plan = reconcile_candidates(
            vec![goal("g1", "improve sleep", GoalStatus::Imagined)],
            &[candidate("improve sleep quality", "started", 0.9)],
            "s1",
            "u1",
            now,
            2,
        );

        assert!(plan.created.is_empty());
        assert_eq!(plan.updated.len(), 1);
        let updated = &plan.updated[0];
        assert_eq!(updated.id, "g1");
        assert_eq!(updated.status, GoalStatus::Started);
        assert_eq!(updated.last_mentioned, now);
        assert!(updated.session_mentions.contains("s0"));
        assert!(updated.session_mentions.contains("s1"));
    }

    #[test]
    fn test_done_goal_never_downgrades() {
        let plan = reconcile_candidates(
            vec![goal("g1", "improve sleep", GoalStatus::Done)],
            &[candidate("improve sleep", "started", 0.9)],
            "s1",
            "u1",
            Utc::now(),
            2,
        );
        assert_eq!(plan.updated[0].status, GoalStatus::Done);
    }

    #[test]
    fn test_abandoned_is_terminal_but_reachable() {
        let plan = reconcile_candidates(
            vec![
                goal("g1", "learn guitar", GoalStatus::Started),
                goal("g2", "quit smoking", GoalStatus::Abandoned),
            ],
            &[
                candidate("learn guitar", "abandoned", 0.8),
                candidate("quit smoking", "done", 0.8),
            ],
            "s1",
            "u1",
            Utc::now(),
            2,
        );
        let by_id = |id: &str| plan.updated.iter().find(|g| g.id == id).unwrap().status;
        assert_eq!(by_id("g1"), GoalStatus::Abandoned);
        assert_eq!(by_id("g2"), GoalStatus::Abandoned);
    }

    #[test]
    fn test_first_match_wins_in_ledger_order() {
        let plan = reconcile_candidates(
            vec![
                goal("older", "exercise daily", GoalStatus::Imagined),
                goal("newer", "exercise", GoalStatus::Imagined),
            ],
            &[candidate("exercise", "started", 0.9)],
            "s1",
            "u1",
            Utc::now(),
            2,
        );
        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.updated[0].id, "older");
    }

    #[test]
    fn test_candidates_in_same_batch_merge() {
        let plan = reconcile_candidates(
            Vec::new(),
            &[
                candidate("Go to the gym", "imagined", 0.7),
                candidate("go to the gym twice a week", "started", 0.9),
            ],
            "s1",
            "u1",
            Utc::now(),
            2,
        );
        assert_eq!(plan.created.len(), 1);
        assert_eq!(plan.created[0].text, "Go to the gym");
        assert_eq!(plan.created[0].status, GoalStatus::Started);
        assert!(plan.updated.is_empty());
    }

    // ========================================================================
    // TEST 4: Tracker persists and degrades
    // ========================================================================

    #[tokio::test]
    async fn test_tracker_persists_new_goals() {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::new(
            "[{\"goal\": \"improve sleep\", \"status\": \"imagined\", \"category\": \"Health\", \"confidence\": 0.8},\
              {\"goal\": \"maybe paint\", \"status\": \"imagined\", \"confidence\": 0.3}]",
        ));
        let tracker = tracker(store.clone(), generator.clone());

        let messages = vec![
            Message::user("I want to improve my sleep", "u1"),
            Message::generated("What would help?"),
        ];
        let result = tracker.reconcile("s1", &messages, "u1").await;

        assert_eq!(result.goals_processed, 1);
        assert_eq!(result.new_goals, 1);
        assert_eq!(result.updated_goals, 0);
        assert!(result.error.is_none());
        assert_eq!(store.count(Collection::Goals).await, 1);

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("I want to improve my sleep"));
        assert!(!prompt.contains("What would help?"));

        let stored: Vec<Goal> = query_records(store.as_ref(), Collection::Goals, &Query::owned_by("u1"))
            .await
            .unwrap();
        assert_eq!(stored[0].category, "health");
    }

    #[tokio::test]
    async fn test_tracker_without_user_text_skips_generation() {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::new("[]"));
        let tracker = tracker(store, generator.clone());

        let result = tracker
            .reconcile("s1", &[Message::generated("How are you?")], "u1")
            .await;
        assert_eq!(result, GoalTrackingResult::default());
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_generation_failure_is_zero_progress() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store.clone(), Arc::new(FailingGenerator));

        let result = tracker
            .reconcile("s1", &[Message::user("I want to run", "u1")], "u1")
            .await;
        assert_eq!(result.goals_processed, 0);
        assert_eq!(result.new_goals, 0);
        assert!(result.error.unwrap().contains("Quota exceeded"));
        assert_eq!(store.count(Collection::Goals).await, 0);
    }
}
