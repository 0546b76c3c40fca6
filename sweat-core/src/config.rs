use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_RESULTS_TABLE: &str = "sweat_results";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SweatConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub insight: InsightConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Generative text service settings.
///
/// `api_key` controls authentication to the generative service. When left
/// empty it falls back to the `GOOGLE_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InsightConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Client-side request timeout. Unset means the service's own timeout applies.
    pub timeout_seconds: Option<u64>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_seconds: None,
        }
    }
}

impl InsightConfig {
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var("GOOGLE_API_KEY").unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Rest,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Rest => "rest",
            StoreBackend::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Project URL of the backend-as-a-service (rest backend only).
    pub url: String,
    /// Project API key sent as `apikey` (rest backend only).
    pub api_key: String,
    /// User session token; the API key is used as bearer when absent.
    pub access_token: Option<String>,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Rest,
            url: String::new(),
            api_key: String::new(),
            access_token: None,
            table: DEFAULT_RESULTS_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    pub denominator: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            denominator: crate::scoring::DEFAULT_DENOMINATOR,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub profile_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl SweatConfig {
    /// Load from a TOML file (optional) layered under `SWEAT__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SWEAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: Self = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let cfg: Self = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scoring.denominator == 0 {
            return Err(ConfigError::Message(
                "scoring.denominator must be greater than zero".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.database.is_none() {
            return Err(ConfigError::Message(
                "store.backend = \"postgres\" requires a [database] section".to_string(),
            ));
        }
        Ok(())
    }
}
