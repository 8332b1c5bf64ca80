use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Goal lifecycle. `Imagined < Started < Done` only ever moves forward;
/// `Abandoned` is reachable from anywhere and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Imagined,
    Started,
    Done,
    Abandoned,
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 4] = [
        GoalStatus::Imagined,
        GoalStatus::Started,
        GoalStatus::Done,
        GoalStatus::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Imagined => "imagined",
            GoalStatus::Started => "started",
            GoalStatus::Done => "done",
            GoalStatus::Abandoned => "abandoned",
        }
    }

    /// Position on the forward-only progression. `Abandoned` has none.
    pub fn rank(&self) -> Option<u8> {
        match self {
            GoalStatus::Imagined => Some(0),
            GoalStatus::Started => Some(1),
            GoalStatus::Done => Some(2),
            GoalStatus::Abandoned => None,
        }
    }

    /// Whether a goal currently at `self` should take `candidate`.
    pub fn accepts(&self, candidate: GoalStatus) -> bool {
        match (self.rank(), candidate.rank()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(next)) => next > current,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, GoalStatus::Imagined | GoalStatus::Started)
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "imagined" => Ok(GoalStatus::Imagined),
            "started" => Ok(GoalStatus::Started),
            "done" => Ok(GoalStatus::Done),
            "abandoned" => Ok(GoalStatus::Abandoned),
            other => Err(format!("unknown goal status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub owner_id: String,
    pub text: String,
    pub status: GoalStatus,
    pub category: String,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
    pub last_mentioned: DateTime<Utc>,
    #[serde(default)]
    pub session_mentions: BTreeSet<String>,
}

/// A goal statement as reported by the text-generation service.
/// Fields are lenient: anything missing or malformed degrades to a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoalCandidate {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl GoalCandidate {
    /// Parsed status; unknown values count as `Imagined`.
    pub fn status(&self) -> GoalStatus {
        self.status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(GoalStatus::Imagined)
    }

    pub fn category(&self) -> String {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_lowercase(),
            _ => "general".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GoalTrackingResult {
    pub goals_processed: usize,
    pub new_goals: usize,
    pub updated_goals: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GoalTrackingResult {
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}
