mod handlers;
mod router;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::scheduler::AgentScheduler;
use crate::core::social::x::XApiClient;
use crate::core::store::AgentStore;

/// An authorization handshake waiting for its callback, keyed by the
/// OAuth `state` parameter.
pub(crate) struct PendingAuth {
    pub agent_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub code_verifier: String,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub store: Arc<AgentStore>,
    pub scheduler: Arc<AgentScheduler>,
    pub x_client: Arc<XApiClient>,
    pub pending_auth: Arc<Mutex<HashMap<String, PendingAuth>>>,
    pub api_port: u16,
}

impl AppState {
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/auth/x/callback", self.api_port)
    }
}

/// Localhost operator API: agent CRUD plus the one-time OAuth2
/// authorization handshake.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(
        store: Arc<AgentStore>,
        scheduler: Arc<AgentScheduler>,
        x_client: Arc<XApiClient>,
        api_port: u16,
    ) -> Self {
        Self {
            state: AppState {
                store,
                scheduler,
                x_client,
                pending_auth: Arc::new(Mutex::new(HashMap::new())),
                api_port,
            },
        }
    }

    pub async fn serve(self, api_host: &str) -> Result<()> {
        let addr = format!("{}:{}", api_host, self.state.api_port);
        let router = router::build_api_router(self.state);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Operator API listening on http://{}", addr);
        axum::serve(listener, router).await?;
        Ok(())
    }
}
