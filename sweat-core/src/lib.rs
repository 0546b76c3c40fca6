pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod insight;
pub mod models;
pub mod notify;
pub mod scoring;
pub mod store;

pub use analysis::{Analyzer, ErrorKind, SubmissionOutcome, SubmissionState, SubmitError};
pub use config::SweatConfig;
pub use error::SweatError;
pub use identity::{IdentityProvider, Profile, StaticIdentity};
pub use insight::{GeminiInsightClient, Insight, InsightBackend, InsightError};
pub use models::{Category, Readings, ResultRecord};
pub use notify::{Notification, Notifier, Severity};
pub use scoring::{RiskScore, RiskScorer};
pub use store::{create_store, ResultStore, StoreError};
