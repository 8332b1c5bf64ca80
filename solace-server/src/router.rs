use serde::Serialize;

use solace_core::error::Result;
use solace_core::ipc::{SolaceRequest, SolaceResponse};

use crate::state::AppState;
use crate::subsystems::{close, conversation, sessions, stats};

pub async fn handle_request(request: SolaceRequest, state: &AppState) -> SolaceResponse {
    let store = state.store.as_ref();

    match request {
        SolaceRequest::Ping => SolaceResponse::pong(),
        SolaceRequest::Health => match store.health().await {
            Ok(backend) => SolaceResponse::ok(serde_json::json!({
                "store": backend,
                "generator": state.generator.name(),
                "status": "healthy"
            })),
            Err(e) => SolaceResponse::err(format!("Store health check failed: {}", e)),
        },
        SolaceRequest::StartSession { user_id } => {
            respond(sessions::start_session(store, &user_id).await)
        }
        SolaceRequest::AppendMessage {
            user_id,
            session_id,
            text,
            role,
        } => respond(sessions::append_message(store, &user_id, &session_id, &text, role).await),
        SolaceRequest::CloseSession { user_id, session_id } => {
            respond(close::close_session(state, &user_id, &session_id).await)
        }
        SolaceRequest::GetSession { user_id, session_id } => {
            respond(sessions::get_session(store, &user_id, &session_id).await)
        }
        SolaceRequest::AnalyzeSession { user_id, session_id } => {
            respond(sessions::analyze_session(store, &user_id, &session_id).await)
        }
        SolaceRequest::GenerateQuestion { user_id, session_id } => {
            respond(conversation::generate_followup(state, &user_id, &session_id).await)
        }
        SolaceRequest::SessionContext { user_id, session_id } => {
            respond(conversation::session_context(state, &user_id, &session_id).await)
        }
        SolaceRequest::History { user_id } => respond(sessions::list_history(store, &user_id).await),
        SolaceRequest::Goals { user_id } => respond(stats::goal_report(store, &user_id).await),
        SolaceRequest::Statistics { user_id } => respond(stats::statistics(store, &user_id).await),
        SolaceRequest::MoodTrends { user_id } => respond(stats::mood_trends(store, &user_id).await),
        SolaceRequest::Overview { user_id } => respond(stats::get_overview(store, &user_id).await),
    }
}

fn respond<T: Serialize>(result: Result<T>) -> SolaceResponse {
    match result {
        Ok(data) => match serde_json::to_value(data) {
            Ok(value) => SolaceResponse::ok(value),
            Err(e) => SolaceResponse::err(format!("Failed to encode response: {}", e)),
        },
        Err(e) => {
            if e.code() == "store_failure" || e.code() == "internal" {
                tracing::error!(error = %e, "Request failed");
            }
            SolaceResponse::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_support::{memory_state, ScriptedGenerator};

    fn data(resp: SolaceResponse) -> serde_json::Value {
        assert!(resp.is_ok(), "unexpected error: {:?}", resp.error);
        resp.data.unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_health() {
        let state = memory_state(Arc::new(ScriptedGenerator::new("ok")));
        assert!(handle_request(SolaceRequest::Ping, &state).await.is_ok());

        let health = data(handle_request(SolaceRequest::Health, &state).await);
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["generator"], "scripted");
    }

    #[tokio::test]
    async fn test_session_round_trip_through_router() {
        let state = memory_state(Arc::new(ScriptedGenerator::new("ok")));
        let session = data(
            handle_request(
                SolaceRequest::StartSession {
                    user_id: "u1".into(),
                },
                &state,
            )
            .await,
        );
        let session_id = session["id"].as_str().unwrap().to_string();

        let appended = data(
            handle_request(
                SolaceRequest::AppendMessage {
                    user_id: "u1".into(),
                    session_id: session_id.clone(),
                    text: "hello".into(),
                    role: Default::default(),
                },
                &state,
            )
            .await,
        );
        assert_eq!(appended["reopened"], false);
        assert_eq!(appended["message"]["role"], "user");

        let closed = data(
            handle_request(
                SolaceRequest::CloseSession {
                    user_id: "u1".into(),
                    session_id,
                },
                &state,
            )
            .await,
        );
        assert_eq!(closed["status"], "not_summarized");
        assert_eq!(closed["reason"], "too short");
    }

    #[tokio::test]
    async fn test_errors_carry_codes() {
        let state = memory_state(Arc::new(ScriptedGenerator::new("ok")));
        let resp = handle_request(
            SolaceRequest::GetSession {
                user_id: "u1".into(),
                session_id: "missing".into(),
            },
            &state,
        )
        .await;
        assert!(!resp.is_ok());
        assert_eq!(resp.code.as_deref(), Some("not_found"));

        let resp = handle_request(SolaceRequest::Overview { user_id: "u1".into() }, &state).await;
        assert_eq!(resp.code.as_deref(), Some("not_found"));
    }
}
