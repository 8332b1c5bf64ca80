use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::emotion::EmotionProfile;
use super::goal::GoalTrackingResult;

/// Per-session close record. Its existence is what marks a session closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub owner_id: String,
    pub summary_text: String,
    pub analytics: EmotionProfile,
    pub goal_tracking: GoalTrackingResult,
    pub created_at: DateTime<Utc>,
}
