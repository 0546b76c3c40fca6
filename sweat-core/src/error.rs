use thiserror::Error;

/// Failures while wiring the service from configuration.
#[derive(Error, Debug)]
pub enum SweatError {
    #[error("Insight error: {0}")]
    Insight(#[from] crate::insight::InsightError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
