//! Idle-session close sweep
//!
//! Periodically closes open sessions that have gone quiet for longer than
//! `idle_minutes`. Each close is independent: one failure is logged and
//! counted, and the sweep moves on.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

use solace_core::config::SweepConfig;
use solace_core::error::Result;
use solace_core::models::{Session, SessionSummary};
use solace_core::store::{query_records, Collection, Query};

use crate::state::AppState;
use crate::subsystems::close::{close_loaded_session, CloseOutcome};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub scanned: usize,
    pub closed: usize,
    pub skipped_short: usize,
    pub failed: usize,
}

pub async fn run_close_sweep_loop(
    state: Arc<AppState>,
    config: SweepConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(config.interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        interval_minutes = config.interval_minutes,
        idle_minutes = config.idle_minutes,
        "Close sweep loop started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_idle_sessions(&state, Utc::now()).await {
                    Ok(report) if report.scanned > 0 => {
                        tracing::info!(
                            scanned = report.scanned,
                            closed = report.closed,
                            skipped_short = report.skipped_short,
                            failed = report.failed,
                            "Close sweep complete"
                        );
                    }
                    Ok(_) => tracing::debug!("Close sweep found no idle sessions"),
                    Err(e) => tracing::warn!(error = %e, "Close sweep failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Close sweep loop shutting down");
                break;
            }
        }
    }
}

/// Close every open session whose last activity is older than the idle window.
pub async fn sweep_idle_sessions(state: &AppState, now: DateTime<Utc>) -> Result<SweepReport> {
    let cutoff = now - Duration::minutes(state.config.sweep.idle_minutes);
    let store = state.store.as_ref();

    let closed: HashSet<String> = query_records::<SessionSummary>(store, Collection::SessionSummaries, &Query::new())
        .await?
        .into_iter()
        .map(|s| s.session_id)
        .collect();

    let sessions: Vec<Session> = query_records(store, Collection::Sessions, &Query::new()).await?;

    let mut report = SweepReport::default();
    for session in sessions
        .iter()
        .filter(|s| !closed.contains(&s.id) && s.last_activity() < cutoff)
    {
        report.scanned += 1;
        match close_loaded_session(state, session).await {
            Ok(CloseOutcome::Summarized { .. }) => report.closed += 1,
            Ok(CloseOutcome::NotSummarized { .. }) => report.skipped_short += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(session_id = %session.id, error = %e, "Idle session close failed");
            }
        }
    }

    Ok(report)
}
