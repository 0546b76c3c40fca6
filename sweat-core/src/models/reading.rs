use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Test-strip zone a reading was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Glucose,
    Ph,
    Cortisol,
    Salt,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Glucose,
        Category::Ph,
        Category::Cortisol,
        Category::Salt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Glucose => "glucose",
            Category::Ph => "ph",
            Category::Cortisol => "cortisol",
            Category::Salt => "salt",
        }
    }

    /// Label used when the reading is shown to a person or a model.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Glucose => "Glucose Zone",
            Category::Ph => "pH Zone",
            Category::Cortisol => "Cortisol Zone",
            Category::Salt => "Salt Zone",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four free-text color readings of one strip.
///
/// Absent and `null` fields both deserialize as empty, so an unfilled form
/// field reaches validation instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readings {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub glucose: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ph: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cortisol: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub salt: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Readings {
    pub fn new(
        glucose: impl Into<String>,
        ph: impl Into<String>,
        cortisol: impl Into<String>,
        salt: impl Into<String>,
    ) -> Self {
        Self {
            glucose: glucose.into(),
            ph: ph.into(),
            cortisol: cortisol.into(),
            salt: salt.into(),
        }
    }

    pub fn get(&self, category: Category) -> &str {
        match category {
            Category::Glucose => &self.glucose,
            Category::Ph => &self.ph,
            Category::Cortisol => &self.cortisol,
            Category::Salt => &self.salt,
        }
    }

    /// Categories whose reading is empty or whitespace-only, in strip order.
    pub fn missing(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.get(*c).trim().is_empty())
            .collect()
    }
}
