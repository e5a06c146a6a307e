//! Post-session analysis recorded into session state.
//!
//! Analysis is written once per session under [`POST_ANALYSIS_KEY`]; a session that
//! already carries the key is never re-analyzed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{InMemorySession, InMemorySessionService, SessionEvent, SessionState};
use crate::types::message::{Author, Turn};
use crate::Result;

pub const POST_ANALYSIS_KEY: &str = "post_analysis_v1";
pub const ANALYSIS_AUTHOR: &str = "analysis_bot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalysis {
    /// Number of user-authored events.
    pub turn_count: usize,
    pub duration_seconds: f64,
    pub used_specialists: Vec<String>,
    pub analysis_timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Recorded(SessionAnalysis),
    AlreadyAnalyzed,
    NoEvents,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub analyzed: usize,
    pub skipped: usize,
}

pub struct SessionAnalyzer {
    specialists: Vec<String>,
}

impl SessionAnalyzer {
    pub fn new<I, S>(specialists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            specialists: specialists.into_iter().map(Into::into).collect(),
        }
    }

    pub fn analyze(&self, events: &[SessionEvent], last_update_time: f64) -> SessionAnalysis {
        let turn_count = events.iter().filter(|e| e.author.is_user()).count();
        let duration = match (events.first(), events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        };
        let used: BTreeSet<String> = events
            .iter()
            .map(|e| e.author.as_str())
            .filter(|a| self.specialists.iter().any(|s| s == a))
            .map(str::to_string)
            .collect();

        SessionAnalysis {
            turn_count,
            duration_seconds: (duration * 100.0).round() / 100.0,
            used_specialists: used.into_iter().collect(),
            analysis_timestamp: last_update_time,
        }
    }

    /// Analyze one session unless it was analyzed before or is empty.
    pub async fn analyze_and_record(&self, session: &InMemorySession) -> Result<AnalysisOutcome> {
        if session.contains(POST_ANALYSIS_KEY).await? {
            debug!(session_id = session.session_id(), "session already analyzed");
            return Ok(AnalysisOutcome::AlreadyAnalyzed);
        }
        let events = session.events()?;
        if events.is_empty() {
            debug!(session_id = session.session_id(), "session has no events");
            return Ok(AnalysisOutcome::NoEvents);
        }

        let analysis = self.analyze(&events, session.last_update_time()?);
        let event = SessionEvent::new(
            Author::Agent(ANALYSIS_AUTHOR.to_string()),
            format!("analysis_{}", session.session_id()),
        )
        .with_content(Turn::from_agent(ANALYSIS_AUTHOR, "Post-session analysis completed."))
        .with_state_delta(POST_ANALYSIS_KEY, serde_json::to_value(&analysis)?);
        session.append_event(event)?;

        info!(
            session_id = session.session_id(),
            turn_count = analysis.turn_count,
            duration_seconds = analysis.duration_seconds,
            "session analysis recorded"
        );
        Ok(AnalysisOutcome::Recorded(analysis))
    }

    /// Analyze every session of a user.
    pub async fn run(
        &self,
        service: &InMemorySessionService,
        app_name: &str,
        user_id: &str,
    ) -> Result<AnalysisSummary> {
        let mut summary = AnalysisSummary::default();
        for session in service.list_sessions(app_name, user_id)? {
            match self.analyze_and_record(&session).await? {
                AnalysisOutcome::Recorded(_) => summary.analyzed += 1,
                AnalysisOutcome::AlreadyAnalyzed | AnalysisOutcome::NoEvents => summary.skipped += 1,
            }
        }
        info!(
            app_name,
            user_id,
            analyzed = summary.analyzed,
            skipped = summary.skipped,
            "session analysis run complete"
        );
        Ok(summary)
    }
}

impl Default for SessionAnalyzer {
    fn default() -> Self {
        Self::new(["WeatherAgent", "StockAgent"])
    }
}
