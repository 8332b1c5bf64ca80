use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::emotion::EmotionDistribution;

/// Per-user aggregate, recomputed from scratch on every close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRollup {
    pub owner_id: String,
    pub overall_summary_text: String,
    pub avg_intensity: f64,
    pub emotion_percentages: EmotionDistribution,
    pub sessions_summarized: usize,
    pub updated_at: DateTime<Utc>,
}
