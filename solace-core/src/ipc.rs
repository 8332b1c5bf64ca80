use serde::{Deserialize, Serialize};

use crate::error::SolaceError;
use crate::models::MessageRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SolaceRequest {
    Ping,
    Health,
    StartSession {
        user_id: String,
    },
    AppendMessage {
        user_id: String,
        session_id: String,
        text: String,
        #[serde(default)]
        role: MessageRole,
    },
    CloseSession {
        user_id: String,
        session_id: String,
    },
    GetSession {
        user_id: String,
        session_id: String,
    },
    AnalyzeSession {
        user_id: String,
        session_id: String,
    },
    GenerateQuestion {
        user_id: String,
        session_id: String,
    },
    SessionContext {
        user_id: String,
        session_id: String,
    },
    History {
        user_id: String,
    },
    Goals {
        user_id: String,
    },
    Statistics {
        user_id: String,
    },
    MoodTrends {
        user_id: String,
    },
    Overview {
        user_id: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SolaceResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    pub version: String,
}

impl SolaceResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            code: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            code: Some("internal".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn from_error(error: &SolaceError) -> Self {
        Self {
            code: Some(error.code().to_string()),
            ..Self::err(error.to_string())
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
