use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub email: EmailConfig,
    pub auth: AuthConfig,
    pub data: DataConfig,
    /// When set, stream error events carry internal details.
    pub debug: bool,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `PATHFINDER_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("PATHFINDER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            llm: LlmConfig::from_env_profiled(p),
            chat: ChatConfig::from_env_profiled(p),
            email: EmailConfig::from_env_profiled(p),
            auth: AuthConfig::from_env_profiled(p),
            data: DataConfig::from_env_profiled(p),
            debug: profiled_env_opt(p, "DEBUG").is_some(),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres: {}",
            if self.postgres.is_configured() { "configured" } else { "(none, in-memory sessions)" }
        );
        tracing::info!(
            "  llm:      model={}, intent_model={}, configured={}",
            self.llm.model,
            self.llm.intent_model,
            self.llm.is_configured()
        );
        tracing::info!(
            "  chat:     max_iterations={}, history_limit={}",
            self.chat.max_iterations,
            self.chat.history_limit
        );
        tracing::info!(
            "  email:    enabled={}, host={}:{}",
            self.email.enabled,
            self.email.smtp_host,
            self.email.smtp_port
        );
        tracing::info!("  debug:    {}", self.debug);
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "postgres": { "configured": self.postgres.is_configured() },
            "llm": {
                "model": self.llm.model,
                "intent_model": self.llm.intent_model,
                "configured": self.llm.is_configured(),
            },
            "chat": {
                "max_iterations": self.chat.max_iterations,
                "history_limit": self.chat.history_limit,
            },
            "email": { "enabled": self.email.enabled, "configured": self.email.is_configured() },
            "auth": { "supabase": self.auth.supabase_jwt_secret.is_some() },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "DATABASE_URL"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| u.starts_with("postgres"))
    }
}

// ── LLM (Gemini) ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    /// Model driving the tool-calling conversation.
    pub model: String,
    /// Cheaper model used for one-shot intent extraction.
    pub intent_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub intent_temperature: f32,
    pub intent_max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.0-flash"),
            intent_model: profiled_env_or(p, "GEMINI_INTENT_MODEL", "gemini-2.0-flash-lite"),
            base_url: profiled_env_or(
                p,
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            timeout_secs: profiled_env_parse(p, "LLM_TIMEOUT_SECS", 60),
            temperature: profiled_env_parse(p, "LLM_TEMPERATURE", 0.7),
            max_tokens: profiled_env_parse(p, "LLM_MAX_TOKENS", 2048),
            intent_temperature: profiled_env_parse(p, "INTENT_TEMPERATURE", 0.1),
            intent_max_tokens: profiled_env_parse(p, "INTENT_MAX_TOKENS", 500),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Chat turn tuning ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub max_iterations: usize,
    /// Recent session messages replayed into the model context.
    pub history_limit: usize,
    pub agent_chunk_size: usize,
    pub fast_path_chunk_size: usize,
    pub poll_interval_ms: u64,
    pub frontend_base_url: String,
}

impl ChatConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_iterations: profiled_env_parse(p, "AGENT_MAX_ITERATIONS", 10),
            history_limit: profiled_env_parse(p, "AGENT_HISTORY_LIMIT", 5),
            agent_chunk_size: profiled_env_parse(p, "AGENT_CHUNK_SIZE", 50),
            fast_path_chunk_size: profiled_env_parse(p, "FAST_PATH_CHUNK_SIZE", 100),
            poll_interval_ms: profiled_env_parse(p, "STREAM_POLL_MS", 100),
            frontend_base_url: profiled_env_or(
                p,
                "FRONTEND_BASE_URL",
                "http://collegepathfinder.vercel.app",
            ),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            history_limit: 5,
            agent_chunk_size: 50,
            fast_path_chunk_size: 100,
            poll_interval_ms: 100,
            frontend_base_url: "http://collegepathfinder.vercel.app".to_string(),
        }
    }
}

// ── Email (SMTP) ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: String,
}

impl EmailConfig {
    fn from_env_profiled(p: &str) -> Self {
        let username = profiled_env_opt(p, "SMTP_USERNAME");
        Self {
            enabled: profiled_env_bool(p, "EMAIL_ENABLED", false),
            smtp_host: profiled_env_or(p, "SMTP_HOST", "smtp.gmail.com"),
            smtp_port: profiled_env_parse(p, "SMTP_PORT", 587),
            from_email: profiled_env_opt(p, "SMTP_FROM_EMAIL").or_else(|| username.clone()),
            username,
            password: profiled_env_opt(p, "SMTP_PASSWORD"),
            from_name: profiled_env_or(p, "SMTP_FROM_NAME", "KCET College Predictor"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

// ── Auth ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    #[serde(skip_serializing)]
    pub supabase_jwt_secret: Option<String>,
}

impl AuthConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            jwt_secret: profiled_env_or(p, "JWT_SECRET_KEY", "change-me-in-production"),
            jwt_algorithm: profiled_env_or(p, "JWT_ALGORITHM", "HS256"),
            supabase_jwt_secret: profiled_env_opt(p, "SUPABASE_JWT_SECRET"),
        }
    }
}

// ── Cutoff dataset ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON seed for the in-memory data service when no database is configured.
    pub cutoff_data_path: Option<PathBuf>,
}

impl DataConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            cutoff_data_path: profiled_env_opt(p, "CUTOFF_DATA_PATH").map(PathBuf::from),
        }
    }
}
