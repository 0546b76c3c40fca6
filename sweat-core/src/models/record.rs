use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reading::Readings;

/// One persisted analysis. Column names match the `sweat_results` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub user_id: Uuid,
    pub glucose: String,
    pub ph: String,
    pub cortisol: String,
    pub salt: String,
    pub ai_insight: String,
    pub pcos_score: u8,
}

impl ResultRecord {
    pub fn new(user_id: Uuid, readings: &Readings, ai_insight: &str, pcos_score: u8) -> Self {
        Self {
            user_id,
            glucose: readings.glucose.clone(),
            ph: readings.ph.clone(),
            cortisol: readings.cortisol.clone(),
            salt: readings.salt.clone(),
            ai_insight: ai_insight.to_string(),
            pcos_score,
        }
    }
}
