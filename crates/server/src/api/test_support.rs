//! In-process application fixture for route tests.

use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;

use pathfinder_agent::{ChatService, Counselor, FastPathRouter, IntentExtractor, SessionStore, TurnSettings};
use pathfinder_core::{Config, MemoryCollegeData};
use pathfinder_llm::provider::mock::ScriptedCompletion;
use pathfinder_tool_runtime::provider::mock::MockLlmProvider;
use pathfinder_tool_runtime::tools::college;
use pathfinder_tool_runtime::ToolRegistry;

use crate::auth::{tests::SECRET, TokenVerifier};
use crate::router::build_router;
use crate::state::{AppState, Backends};

pub(crate) fn app() -> (Router, Arc<AppState>) {
    app_with(&[], Arc::new(MockLlmProvider::new()))
}

/// App whose intent model answers `intents` in order and whose counselor is `agent`.
pub(crate) fn app_with(intents: &[&str], agent: Arc<MockLlmProvider>) -> (Router, Arc<AppState>) {
    let mut config = Config::for_profile("PFSERVERTEST");
    config.auth.jwt_secret = SECRET.into();
    config.auth.jwt_algorithm = "HS256".into();
    config.auth.supabase_jwt_secret = None;
    config.debug = false;

    let data = Arc::new(MemoryCollegeData::builtin().unwrap());
    let mut completion = ScriptedCompletion::new();
    for intent in intents {
        completion = completion.reply(*intent);
    }
    let router = FastPathRouter::new(IntentExtractor::new(Arc::new(completion), 0.1, 500), data.clone());

    let mut registry = ToolRegistry::new();
    for tool in college::all(data) {
        registry.register_arc(tool).unwrap();
    }
    let counselor = Counselor::new(agent, Arc::new(registry)).with_max_iterations(3);
    let chat = Arc::new(ChatService::new(
        router,
        counselor,
        Arc::new(SessionStore::in_memory()),
        TurnSettings::default(),
    ));

    let auth = TokenVerifier::from_config(&config.auth).unwrap();
    let backends = Backends {
        data: "memory",
        sessions: "memory".into(),
        llm: "mock".into(),
        email: false,
    };
    let state = Arc::new(AppState::new(config, chat, auth, backends));
    (build_router(state.clone()), state)
}

pub(crate) async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub(crate) async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
