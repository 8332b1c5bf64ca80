//! Session close and per-user rollup
//!
//! Closing a session with enough messages runs the summarizer, the emotion
//! scorer and the goal tracker over it independently, stores the merged
//! SessionSummary, then rebuilds the owner's UserRollup from every summary
//! they have. The rollup is always a full rescan, never an incremental update.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use solace_core::error::Result;
use solace_core::models::emotion::{renormalize_distribution, zero_distribution, EmotionDistribution};
use solace_core::models::{Emotion, EmotionProfile, GoalTrackingResult, Session, SessionSummary, UserRollup};
use solace_core::scorer;
use solace_core::store::{query_records, set_record, Collection, Query};

use crate::state::AppState;
use crate::subsystems::sessions::load_owned_session;

pub const TOO_SHORT: &str = "too short";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CloseOutcome {
    NotSummarized {
        reason: String,
    },
    Summarized {
        summary: String,
        analytics: EmotionProfile,
        overall_summary: String,
        goal_tracking: GoalTrackingResult,
    },
}

impl CloseOutcome {
    pub fn is_summarized(&self) -> bool {
        matches!(self, CloseOutcome::Summarized { .. })
    }
}

pub async fn close_session(state: &AppState, owner_id: &str, session_id: &str) -> Result<CloseOutcome> {
    let session = load_owned_session(state.store.as_ref(), owner_id, session_id).await?;
    close_loaded_session(state, &session).await
}

/// Close a session already loaded and ownership-checked.
pub async fn close_loaded_session(state: &AppState, session: &Session) -> Result<CloseOutcome> {
    let min_messages = state.config.analytics.min_messages_to_summarize;
    if session.messages.len() < min_messages {
        tracing::debug!(
            session_id = %session.id,
            messages = session.messages.len(),
            "Session too short to summarize"
        );
        return Ok(CloseOutcome::NotSummarized {
            reason: TOO_SHORT.to_string(),
        });
    }

    let summarizer = state.summarizer();
    let tracker = state.goal_tracker();

    let (summary_text, analytics, goal_tracking) = tokio::join!(
        summarizer.summarize_messages(&session.messages),
        async { scorer::score(&session.messages) },
        tracker.reconcile(&session.id, &session.messages, &session.owner_id),
    );

    let summary = SessionSummary {
        session_id: session.id.clone(),
        owner_id: session.owner_id.clone(),
        summary_text,
        analytics,
        goal_tracking,
        created_at: Utc::now(),
    };
    set_record(state.store.as_ref(), Collection::SessionSummaries, &session.id, &summary).await?;

    tracing::info!(
        session_id = %session.id,
        owner_id = %session.owner_id,
        avg_intensity = summary.analytics.avg_intensity,
        "Session closed"
    );

    let rollup = recompute_rollup(state, &session.owner_id).await?;

    Ok(CloseOutcome::Summarized {
        summary: summary.summary_text,
        analytics: summary.analytics,
        overall_summary: rollup.overall_summary_text,
        goal_tracking: summary.goal_tracking,
    })
}

/// Rebuild and store the owner's rollup from all of their summaries.
pub async fn recompute_rollup(state: &AppState, owner_id: &str) -> Result<UserRollup> {
    let summaries: Vec<SessionSummary> = query_records(
        state.store.as_ref(),
        Collection::SessionSummaries,
        &Query::owned_by(owner_id).order_by_asc("created_at"),
    )
    .await?;

    let texts: Vec<String> = summaries.iter().map(|s| s.summary_text.clone()).collect();
    let overall_summary_text = state.summarizer().summarize_history(&texts).await;

    let profiles: Vec<&EmotionProfile> = summaries.iter().map(|s| &s.analytics).collect();
    let (avg_intensity, emotion_percentages) = aggregate(&profiles);

    let rollup = UserRollup {
        owner_id: owner_id.to_string(),
        overall_summary_text,
        avg_intensity,
        emotion_percentages,
        sessions_summarized: summaries.len(),
        updated_at: Utc::now(),
    };
    set_record(state.store.as_ref(), Collection::UserSummaries, owner_id, &rollup).await?;

    tracing::info!(
        owner_id = %owner_id,
        sessions = rollup.sessions_summarized,
        avg_intensity = rollup.avg_intensity,
        "Rollup recomputed"
    );
    Ok(rollup)
}

/// Mean intensity (0 with no profiles) and the unrounded mean distribution,
/// renormalised to sum to one.
pub fn aggregate(profiles: &[&EmotionProfile]) -> (f64, EmotionDistribution) {
    if profiles.is_empty() {
        return (0.0, zero_distribution());
    }
    let n = profiles.len() as f64;

    let avg_intensity = profiles.iter().map(|p| p.avg_intensity).sum::<f64>() / n;

    let mut distribution: EmotionDistribution = Emotion::ALL
        .iter()
        .map(|e| {
            let total: f64 = profiles
                .iter()
                .map(|p| p.emotion_percentages.get(e).copied().unwrap_or(0.0))
                .sum();
            (*e, total / n)
        })
        .collect();
    renormalize_distribution(&mut distribution);

    (avg_intensity, distribution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::models::emotion::default_distribution;

    fn profile(avg_intensity: f64, shares: &[(Emotion, f64)]) -> EmotionProfile {
        let mut emotion_percentages = zero_distribution();
        for (e, v) in shares {
            emotion_percentages.insert(*e, *v);
        }
        EmotionProfile {
            emotion_percentages,
            avg_intensity,
            message_analysis: Default::default(),
        }
    }

    #[test]
    fn test_aggregate_means_intensity() {
        let a = profile(4.0, &[(Emotion::Sad, 1.0)]);
        let b = profile(6.0, &[(Emotion::Happy, 1.0)]);
        let (avg, dist) = aggregate(&[&a, &b]);
        assert_eq!(avg, 5.0);
        assert_eq!(dist[&Emotion::Sad], 0.5);
        assert_eq!(dist[&Emotion::Happy], 0.5);
    }

    #[test]
    fn test_aggregate_keeps_unrounded_means() {
        let a = profile(5.0, &[(Emotion::Sad, 0.667), (Emotion::Anxious, 0.333)]);
        let b = profile(7.0, &[(Emotion::Sad, 0.5), (Emotion::Happy, 0.5)]);
        let (avg, dist) = aggregate(&[&a, &b]);
        assert_eq!(avg, 6.0);
        assert!((dist[&Emotion::Sad] - 0.5835).abs() < 1e-9);
        assert!((dist[&Emotion::Anxious] - 0.1665).abs() < 1e-9);
        assert!((dist[&Emotion::Happy] - 0.25).abs() < 1e-9);
        let sum: f64 = dist.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_thirds_sum_to_one() {
        let a = profile(5.0, &[(Emotion::Sad, 1.0)]);
        let b = profile(5.0, &[(Emotion::Happy, 1.0)]);
        let c = profile(5.0, &[(Emotion::Angry, 1.0)]);
        let (_, dist) = aggregate(&[&a, &b, &c]);
        let sum: f64 = dist.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        for e in [Emotion::Sad, Emotion::Happy, Emotion::Angry] {
            assert!((dist[&e] - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_aggregate_empty() {
        let (avg, dist) = aggregate(&[]);
        assert_eq!(avg, 0.0);
        assert_eq!(dist.len(), 10);
        assert!(dist.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_aggregate_of_defaults_is_default() {
        let a = profile(5.0, &[]);
        let a = EmotionProfile {
            emotion_percentages: default_distribution(),
            ..a
        };
        let (_, dist) = aggregate(&[&a, &a]);
        assert_eq!(dist, default_distribution());
    }

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = CloseOutcome::NotSummarized {
            reason: TOO_SHORT.to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "not_summarized");
        assert_eq!(value["reason"], "too short");
    }
}
