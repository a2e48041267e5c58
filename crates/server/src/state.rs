//! Shared application state and its assembly from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use pathfinder_agent::{
    ChatService, Counselor, FastPathRouter, IntentExtractor, SessionStore, TurnSettings,
};
use pathfinder_core::{CollegeData, Config, MemoryCollegeData};
use pathfinder_notify::{Mailer, ReportRenderer, SmtpMailer};
use pathfinder_tool_runtime::counselor_registry;

use crate::auth::TokenVerifier;
use crate::college_repo::PgCollegeData;
use crate::db;
use crate::session_repo::PgSessionBackend;

/// Which concrete collaborators are serving requests.
#[derive(Debug, Clone, Serialize)]
pub struct Backends {
    pub data: &'static str,
    pub sessions: String,
    pub llm: String,
    pub email: bool,
}

pub struct AppState {
    pub config: Config,
    pub chat: Arc<ChatService>,
    pub auth: TokenVerifier,
    pub backends: Backends,
}

impl AppState {
    pub fn new(config: Config, chat: Arc<ChatService>, auth: TokenVerifier, backends: Backends) -> Self {
        Self {
            config,
            chat,
            auth,
            backends,
        }
    }

    /// Connect backends and build the chat pipeline.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let pool = db::init_pg_pool(&config.postgres).await;

        let (data, data_backend): (Arc<dyn CollegeData>, &'static str) = match &pool {
            Some(pool) => (Arc::new(PgCollegeData::new(pool.clone())), "postgres"),
            None => (Arc::new(memory_data(&config)?), "memory"),
        };
        let sessions = match &pool {
            Some(pool) => SessionStore::new(Arc::new(PgSessionBackend::new(pool.clone()))),
            None => SessionStore::in_memory(),
        };

        let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&config.email) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                warn!(error = %e, "SMTP mailer unavailable, report emails disabled");
                Arc::new(SmtpMailer::disabled())
            }
        };
        let renderer = Arc::new(ReportRenderer::new().context("loading report templates")?);
        let registry = counselor_registry(data.clone(), mailer, renderer)
            .context("registering counselor tools")?;
        info!(tools = registry.list().len(), "tool registry ready");

        let agent_provider = pathfinder_llm::create_provider(&config.llm)
            .context("creating the counselor model provider")?;
        let intent_provider = pathfinder_llm::create_intent_provider(&config.llm)
            .context("creating the intent model provider")?;
        let llm = agent_provider.provider_name().to_string();

        let extractor = IntentExtractor::new(
            intent_provider,
            config.llm.intent_temperature,
            config.llm.intent_max_tokens,
        );
        let router = FastPathRouter::new(extractor, data);
        let counselor = Counselor::new(agent_provider, Arc::new(registry))
            .with_max_iterations(config.chat.max_iterations)
            .with_history_limit(config.chat.history_limit)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
            .with_model_timeout(config.llm.timeout())
            .with_frontend_base_url(config.chat.frontend_base_url.clone());

        let backends = Backends {
            data: data_backend,
            sessions: sessions.backend_name().to_string(),
            llm,
            email: config.email.enabled && config.email.is_configured(),
        };
        let chat = Arc::new(ChatService::new(
            router,
            counselor,
            Arc::new(sessions),
            TurnSettings::from_config(&config),
        ));
        let auth = TokenVerifier::from_config(&config.auth).context("configuring token verification")?;

        info!(
            data = backends.data,
            sessions = %backends.sessions,
            llm = %backends.llm,
            email = backends.email,
            "backends ready"
        );
        Ok(Self::new(config, chat, auth, backends))
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.chat.poll_interval()
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.chat.sessions()
    }
}

fn memory_data(config: &Config) -> anyhow::Result<MemoryCollegeData> {
    match &config.data.cutoff_data_path {
        Some(path) => MemoryCollegeData::from_json_file(path)
            .with_context(|| format!("loading cutoff data from {}", path.display())),
        None => {
            warn!("CUTOFF_DATA_PATH not set, serving the bundled sample dataset");
            Ok(MemoryCollegeData::builtin()?)
        }
    }
}
