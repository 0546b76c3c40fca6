//! Heuristic PCOS risk scoring from strip color readings
//!
//! Each zone contributes 0, 5 or 10 points from case-insensitive keyword
//! matches. The sum is divided by a fixed denominator and expressed as a
//! rounded percentage, clamped to 100.
//!
//! Four zones can reach 40 points while the default denominator is 30, so
//! strongly positive strips saturate at 100 before every zone is at its
//! maximum. A denominator of 40 gives the "every zone at 10 points" scale.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Category, Readings};

pub const DEFAULT_DENOMINATOR: u32 = 30;

pub const STRONG_POINTS: u32 = 10;
pub const MILD_POINTS: u32 = 5;

/// Keywords that earn a zone its points. `strong` is checked first.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub strong: &'static [&'static str],
    pub mild: &'static [&'static str],
}

// Salt only tests "yellow" / "moderate" on the weaker side: "light" and
// "light brown" were never matched, and "dark yellow" is already caught by
// "yellow". Scores recorded so far depend on this, so it stays.
const GLUCOSE: KeywordRule = KeywordRule {
    strong: &["dark", "high"],
    mild: &["moderate"],
};
const PH: KeywordRule = KeywordRule {
    strong: &["purple", "alkaline"],
    mild: &["neutral", "green"],
};
const CORTISOL: KeywordRule = KeywordRule {
    strong: &["dark", "high"],
    mild: &["faint", "moderate"],
};
const SALT: KeywordRule = KeywordRule {
    strong: &["yellow", "high"],
    mild: &["moderate"],
};

pub fn rule_for(category: Category) -> KeywordRule {
    match category {
        Category::Glucose => GLUCOSE,
        Category::Ph => PH,
        Category::Cortisol => CORTISOL,
        Category::Salt => SALT,
    }
}

/// Points one reading earns under its zone's rule.
pub fn zone_points(category: Category, reading: &str) -> u32 {
    let rule = rule_for(category);
    let lowered = reading.to_lowercase();
    if rule.strong.iter().any(|k| lowered.contains(k)) {
        STRONG_POINTS
    } else if rule.mild.iter().any(|k| lowered.contains(k)) {
        MILD_POINTS
    } else {
        0
    }
}

/// Risk percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RiskScorer {
    denominator: u32,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            denominator: DEFAULT_DENOMINATOR,
        }
    }
}

impl RiskScorer {
    /// A zero denominator falls back to the default.
    pub fn new(denominator: u32) -> Self {
        let denominator = if denominator == 0 {
            DEFAULT_DENOMINATOR
        } else {
            denominator
        };
        Self { denominator }
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    pub fn points(&self, readings: &Readings) -> u32 {
        Category::ALL
            .into_iter()
            .map(|c| zone_points(c, readings.get(c)))
            .sum()
    }

    pub fn score(&self, readings: &Readings) -> RiskScore {
        let raw = (self.points(readings) as f64 / self.denominator as f64 * 100.0).round();
        RiskScore(raw.min(RiskScore::MAX as f64) as u8)
    }
}

/// Score four readings with the default denominator.
pub fn score(glucose: &str, ph: &str, cortisol: &str, salt: &str) -> RiskScore {
    RiskScorer::default().score(&Readings::new(glucose, ph, cortisol, salt))
}
