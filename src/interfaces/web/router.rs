use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{agents, auth};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    let cors = build_localhost_cors(state.api_port);

    Router::new()
        .route(
            "/api/agents",
            get(agents::get_agents).post(agents::create_agent_endpoint),
        )
        .route(
            "/api/agents/{id}",
            patch(agents::patch_agent_endpoint).delete(agents::delete_agent_endpoint),
        )
        .route("/api/agents/{id}/toggle", post(agents::toggle_agent_endpoint))
        .route("/auth/x", get(auth::begin_auth_endpoint))
        .route("/auth/x/callback", get(auth::auth_callback_endpoint))
        .layer(cors)
        .with_state(state)
}
