use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use super::super::{AppState, PendingAuth};
use crate::core::social::SocialClient;
use crate::core::social::x;

fn error_json(message: impl Into<String>) -> Response {
    Json(serde_json::json!({ "success": false, "error": message.into() })).into_response()
}

#[derive(Deserialize)]
pub struct BeginAuthQuery {
    agent_id: String,
}

/// Step 1 of the handshake: redirect the operator's browser to the
/// provider's consent page. The PKCE verifier and app credentials are
/// parked in memory under the `state` nonce until the callback.
pub async fn begin_auth_endpoint(
    Query(query): Query<BeginAuthQuery>,
    State(state): State<AppState>,
) -> Response {
    let agent = match state.store.get_agent(&query.agent_id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => return error_json("Agent not found"),
        Err(e) => return error_json(e.to_string()),
    };
    if agent.client_id.is_empty() || agent.client_secret.is_empty() {
        return error_json("Fill in the agent's client id and client secret first");
    }

    let oauth_state = x::generate_state();
    let code_verifier = x::generate_code_verifier();
    let challenge = x::code_challenge(&code_verifier);
    let url = x::build_authorize_url(
        &agent.client_id,
        &state.callback_url(),
        &oauth_state,
        &challenge,
    );

    state.pending_auth.lock().await.insert(
        oauth_state,
        PendingAuth {
            agent_id: agent.id,
            client_id: agent.client_id,
            client_secret: agent.client_secret,
            code_verifier,
        },
    );

    Redirect::temporary(&url).into_response()
}

#[derive(Deserialize)]
pub struct AuthCallbackQuery {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
}

/// Step 2: the provider redirects back with a one-time code. Exchange
/// it, look up the account identity, persist the token tuple, and
/// recompute the schedule (the agent may just have become eligible).
pub async fn auth_callback_endpoint(
    Query(query): Query<AuthCallbackQuery>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    if let Some(error) = query.error {
        return Json(serde_json::json!({ "success": false, "error": error }));
    }
    let (Some(oauth_state), Some(code)) = (query.state, query.code) else {
        return Json(serde_json::json!({
            "success": false,
            "error": "Missing state or code in callback"
        }));
    };

    let Some(pending) = state.pending_auth.lock().await.remove(&oauth_state) else {
        return Json(serde_json::json!({
            "success": false,
            "error": "Stored state did not match"
        }));
    };

    let tokens = match state
        .x_client
        .exchange_code(
            &pending.client_id,
            &pending.client_secret,
            &code,
            &pending.code_verifier,
            &state.callback_url(),
        )
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };

    let account = match state.x_client.me(&tokens.access_token).await {
        Ok(account) => account,
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };

    if let Err(e) = state
        .store
        .set_authorized(
            &pending.agent_id,
            &tokens.access_token,
            &tokens.refresh_token,
            &account.handle,
            &account.id,
        )
        .await
    {
        return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
    }

    info!(agent = %pending.agent_id, handle = %account.handle, "agent authorized");
    if let Err(e) = state.scheduler.reschedule_all().await {
        warn!("reschedule after authorization failed: {e:#}");
    }

    Json(serde_json::json!({
        "success": true,
        "agent_id": pending.agent_id,
        "handle": account.handle
    }))
}
