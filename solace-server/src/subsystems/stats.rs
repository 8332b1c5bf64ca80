//! Per-user statistics, goal report, mood trends and overview

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use solace_core::error::{Result, SolaceError};
use solace_core::models::{Emotion, EmotionDistribution, Goal, GoalStatus, Session, SessionSummary, UserRollup};
use solace_core::store::{get_record, query_records, Collection, DocumentStore, Query};

use crate::subsystems::close::aggregate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_sessions: usize,
    pub closed_sessions: usize,
    pub consecutive_days: usize,
    pub total_messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalReport {
    pub goals: Vec<Goal>,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodPoint {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub avg_intensity: f64,
    pub dominant_emotion: Emotion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodTrends {
    pub sessions: Vec<MoodPoint>,
    pub emotion_totals: EmotionDistribution,
}

pub async fn statistics(store: &dyn DocumentStore, owner_id: &str) -> Result<Statistics> {
    let sessions: Vec<Session> =
        query_records(store, Collection::Sessions, &Query::owned_by(owner_id)).await?;
    let closed: Vec<SessionSummary> =
        query_records(store, Collection::SessionSummaries, &Query::owned_by(owner_id)).await?;

    let dates: Vec<NaiveDate> = sessions.iter().map(|s| s.created_at.date_naive()).collect();

    Ok(Statistics {
        total_sessions: sessions.len(),
        closed_sessions: closed.len(),
        consecutive_days: consecutive_days(dates),
        total_messages: sessions.iter().map(|s| s.messages.len()).sum(),
    })
}

/// Length of the run of consecutive calendar days ending at the newest date.
pub fn consecutive_days(mut dates: Vec<NaiveDate>) -> usize {
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let Some(first) = dates.first().copied() else {
        return 0;
    };

    let mut run = 1;
    let mut previous = first;
    for date in dates.into_iter().skip(1) {
        if previous - date != Duration::days(1) {
            break;
        }
        run += 1;
        previous = date;
    }
    run
}

pub async fn goal_report(store: &dyn DocumentStore, owner_id: &str) -> Result<GoalReport> {
    let goals: Vec<Goal> = query_records(
        store,
        Collection::Goals,
        &Query::owned_by(owner_id).order_by_desc("last_mentioned"),
    )
    .await?;

    let mut by_status: BTreeMap<String, usize> = GoalStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();

    for goal in &goals {
        *by_status.entry(goal.status.as_str().to_string()).or_insert(0) += 1;
        *by_category.entry(goal.category.clone()).or_insert(0) += 1;
    }

    Ok(GoalReport {
        total: goals.len(),
        goals,
        by_status,
        by_category,
    })
}

pub async fn mood_trends(store: &dyn DocumentStore, owner_id: &str) -> Result<MoodTrends> {
    let summaries: Vec<SessionSummary> = query_records(
        store,
        Collection::SessionSummaries,
        &Query::owned_by(owner_id).order_by_asc("created_at"),
    )
    .await?;

    let profiles: Vec<_> = summaries.iter().map(|s| &s.analytics).collect();
    let (_, emotion_totals) = aggregate(&profiles);

    let sessions = summaries
        .iter()
        .map(|s| MoodPoint {
            session_id: s.session_id.clone(),
            created_at: s.created_at,
            avg_intensity: s.analytics.avg_intensity,
            dominant_emotion: s.analytics.dominant_emotion(),
        })
        .collect();

    Ok(MoodTrends {
        sessions,
        emotion_totals,
    })
}

pub async fn get_overview(store: &dyn DocumentStore, owner_id: &str) -> Result<UserRollup> {
    get_record(store, Collection::UserSummaries, owner_id)
        .await?
        .ok_or_else(|| SolaceError::NotFound {
            kind: "overview",
            id: owner_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::models::emotion::zero_distribution;
    use solace_core::models::{EmotionProfile, GoalTrackingResult, Message};
    use solace_core::store::set_record;
    use solace_core::MemoryStore;
    use std::collections::BTreeSet;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_consecutive_days() {
        assert_eq!(consecutive_days(vec![]), 0);
        assert_eq!(consecutive_days(vec![day("2026-03-05")]), 1);
        assert_eq!(
            consecutive_days(vec![
                day("2026-03-03"),
                day("2026-03-05"),
                day("2026-03-04"),
                day("2026-03-05"),
                day("2026-03-01"),
            ]),
            3
        );
        assert_eq!(consecutive_days(vec![day("2026-03-05"), day("2026-03-03")]), 1);
    }

    #[tokio::test]
    async fn test_statistics_counts() {
        let store = MemoryStore::new();
        let mut s1 = Session::new("s1", "u1");
        s1.created_at = at("2026-03-04T10:00:00Z");
        s1.messages = vec![Message::user("a", "u1"), Message::generated("b")];
        let mut s2 = Session::new("s2", "u1");
        s2.created_at = at("2026-03-05T23:00:00Z");
        s2.messages = vec![Message::user("c", "u1")];
        let s3 = Session::new("s3", "u2");
        for s in [&s1, &s2, &s3] {
            set_record(&store, Collection::Sessions, &s.id, s).await.unwrap();
        }
        let summary = SessionSummary {
            session_id: "s1".to_string(),
            owner_id: "u1".to_string(),
            summary_text: "x".to_string(),
            analytics: solace_core::scorer::score(&[]),
            goal_tracking: GoalTrackingResult::default(),
            created_at: Utc::now(),
        };
        set_record(&store, Collection::SessionSummaries, "s1", &summary).await.unwrap();

        let stats = statistics(&store, "u1").await.unwrap();
        assert_eq!(
            stats,
            Statistics {
                total_sessions: 2,
                closed_sessions: 1,
                consecutive_days: 2,
                total_messages: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_goal_report_includes_zero_statuses() {
        let store = MemoryStore::new();
        for (id, status, category) in [
            ("g1", GoalStatus::Started, "health"),
            ("g2", GoalStatus::Started, "career"),
            ("g3", GoalStatus::Done, "health"),
        ] {
            let now = Utc::now();
            let goal = Goal {
                id: id.to_string(),
                owner_id: "u1".to_string(),
                text: id.to_string(),
                status,
                category: category.to_string(),
                confidence_score: 0.9,
                created_at: now,
                last_mentioned: now,
                session_mentions: BTreeSet::new(),
            };
            set_record(&store, Collection::Goals, id, &goal).await.unwrap();
        }

        let report = goal_report(&store, "u1").await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.by_status["started"], 2);
        assert_eq!(report.by_status["done"], 1);
        assert_eq!(report.by_status["imagined"], 0);
        assert_eq!(report.by_status["abandoned"], 0);
        assert_eq!(report.by_category["health"], 2);
        assert_eq!(report.by_category["career"], 1);
    }

    #[tokio::test]
    async fn test_mood_trends_chronological() {
        let store = MemoryStore::new();
        for (id, when, emotion, intensity) in [
            ("late", "2026-03-05T10:00:00Z", Emotion::Sad, 7.0),
            ("early", "2026-03-01T10:00:00Z", Emotion::Hopeful, 5.0),
        ] {
            let mut emotion_percentages = zero_distribution();
            emotion_percentages.insert(emotion, 1.0);
            let summary = SessionSummary {
                session_id: id.to_string(),
                owner_id: "u1".to_string(),
                summary_text: String::new(),
                analytics: EmotionProfile {
                    emotion_percentages,
                    avg_intensity: intensity,
                    message_analysis: Default::default(),
                },
                goal_tracking: GoalTrackingResult::default(),
                created_at: at(when),
            };
            set_record(&store, Collection::SessionSummaries, id, &summary).await.unwrap();
        }

        let trends = mood_trends(&store, "u1").await.unwrap();
        assert_eq!(trends.sessions.len(), 2);
        assert_eq!(trends.sessions[0].session_id, "early");
        assert_eq!(trends.sessions[0].dominant_emotion, Emotion::Hopeful);
        assert_eq!(trends.sessions[1].dominant_emotion, Emotion::Sad);
        assert_eq!(trends.emotion_totals[&Emotion::Sad], 0.5);
    }

    #[tokio::test]
    async fn test_overview_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = get_overview(&store, "u1").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
