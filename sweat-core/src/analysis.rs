//! Submission orchestrator
//!
//! Runs one strip submission through
//! `Idle → Validating → Scoring → RequestingInsight → Persisting → Done`,
//! dropping to `Error(kind)` at the first failing step. Every visited state is
//! kept on the outcome so callers (and tests) can see exactly how far a run
//! got. Score and insight stay on the outcome even when a later step fails.
//!
//! A form key (the attribution id) can only have one run in flight; a second
//! submit for the same key is rejected as `Busy` without doing any work.
//! Profiles without an id are not gated. Repeat submissions after a run
//! finishes are accepted and produce another record.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Profile;
use crate::insight::{request_insight, Insight, InsightBackend, InsightError};
use crate::models::{Category, Readings, ResultRecord};
use crate::notify::{Notification, Notifier};
use crate::scoring::{RiskScore, RiskScorer};
use crate::store::{ResultStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingInput,
    InsightUnavailable,
    PersistFailed,
    Busy,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "missing_input",
            ErrorKind::InsightUnavailable => "insight_unavailable",
            ErrorKind::PersistFailed => "persist_failed",
            ErrorKind::Busy => "busy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionState {
    Idle,
    Validating,
    Scoring,
    RequestingInsight,
    Persisting,
    Done,
    Error(ErrorKind),
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Validating => "validating",
            SubmissionState::Scoring => "scoring",
            SubmissionState::RequestingInsight => "requesting_insight",
            SubmissionState::Persisting => "persisting",
            SubmissionState::Done => "done",
            SubmissionState::Error(_) => "error",
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Error(kind) => write!(f, "error({})", kind.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Missing readings: {}", join_categories(.missing))]
    MissingInput { missing: Vec<Category> },

    #[error("Insight unavailable: {0}")]
    InsightUnavailable(#[source] InsightError),

    #[error("{0}")]
    PersistFailed(#[source] StoreError),

    #[error("An analysis is already in progress for this form")]
    Busy,
}

fn join_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::MissingInput { .. } => ErrorKind::MissingInput,
            SubmitError::InsightUnavailable(_) => ErrorKind::InsightUnavailable,
            SubmitError::PersistFailed(_) => ErrorKind::PersistFailed,
            SubmitError::Busy => ErrorKind::Busy,
        }
    }

    pub fn notification(&self) -> Notification {
        match self {
            SubmitError::MissingInput { .. } => Notification::missing_input(),
            SubmitError::InsightUnavailable(_) => Notification::insight_unavailable(),
            SubmitError::PersistFailed(e) => Notification::persist_failed(e.to_string()),
            SubmitError::Busy => Notification::busy(),
        }
    }
}

/// What a finished submission leaves behind.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub states: Vec<SubmissionState>,
    pub score: Option<RiskScore>,
    pub insight: Option<Insight>,
    pub notification: Notification,
    pub error: Option<SubmitError>,
}

impl SubmissionOutcome {
    pub fn state(&self) -> SubmissionState {
        self.states.last().copied().unwrap_or(SubmissionState::Idle)
    }

    pub fn is_done(&self) -> bool {
        self.state() == SubmissionState::Done
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(SubmitError::kind)
    }
}

struct Run {
    states: Vec<SubmissionState>,
    score: Option<RiskScore>,
    insight: Option<Insight>,
}

impl Run {
    fn new() -> Self {
        Self {
            states: vec![SubmissionState::Idle],
            score: None,
            insight: None,
        }
    }

    fn enter(&mut self, state: SubmissionState) {
        tracing::debug!(state = %state, "submission transition");
        self.states.push(state);
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

pub struct Analyzer {
    scorer: RiskScorer,
    insight: Arc<dyn InsightBackend>,
    store: Arc<dyn ResultStore>,
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<HashSet<String>>,
}

impl Analyzer {
    pub fn new(
        scorer: RiskScorer,
        insight: Arc<dyn InsightBackend>,
        store: Arc<dyn ResultStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            scorer,
            insight,
            store,
            notifier,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &dyn ResultStore {
        self.store.as_ref()
    }

    fn claim(&self, key: &str) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            key: key.to_string(),
        })
    }

    /// Run one submission to a terminal state.
    pub async fn submit(&self, readings: Readings, profile: Profile) -> SubmissionOutcome {
        let mut run = Run::new();

        let _guard = match profile.attribution_id() {
            Some(id) => match self.claim(&id.to_string()) {
                Some(guard) => Some(guard),
                None => return self.finish(run, Some(SubmitError::Busy)),
            },
            None => None,
        };

        let error = self.drive(&mut run, &readings, profile).await.err();
        self.finish(run, error)
    }

    async fn drive(
        &self,
        run: &mut Run,
        readings: &Readings,
        profile: Profile,
    ) -> Result<(), SubmitError> {
        run.enter(SubmissionState::Validating);
        let missing = readings.missing();
        if !missing.is_empty() {
            return Err(SubmitError::MissingInput { missing });
        }

        run.enter(SubmissionState::Scoring);
        let score = self.scorer.score(readings);
        run.score = Some(score);
        tracing::info!(score = score.value(), "Risk score computed");

        run.enter(SubmissionState::RequestingInsight);
        let insight = request_insight(self.insight.as_ref(), readings, score)
            .await
            .map_err(|e| {
                tracing::error!(backend = self.insight.name(), error = %e, "Insight request failed");
                SubmitError::InsightUnavailable(e)
            })?;
        run.insight = Some(insight.clone());

        run.enter(SubmissionState::Persisting);
        let user_id = profile
            .attribution_id()
            .ok_or(SubmitError::PersistFailed(StoreError::MissingUser))?;
        let record = ResultRecord::new(user_id, readings, insight.as_str(), score.value());
        self.store.persist(&record).await.map_err(|e| {
            tracing::error!(store = self.store.name(), error = %e, "Result insert failed");
            SubmitError::PersistFailed(e)
        })?;

        tracing::info!(user_id = %user_id, score = score.value(), "Analysis saved");
        Ok(())
    }

    fn finish(&self, mut run: Run, error: Option<SubmitError>) -> SubmissionOutcome {
        let notification = match &error {
            Some(e) => {
                run.enter(SubmissionState::Error(e.kind()));
                e.notification()
            }
            None => {
                run.enter(SubmissionState::Done);
                Notification::success()
            }
        };
        self.notifier.notify(&notification);

        SubmissionOutcome {
            states: run.states,
            score: run.score,
            insight: run.insight,
            notification,
            error,
        }
    }
}
