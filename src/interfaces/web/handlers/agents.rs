use axum::{
    Json,
    extract::{Path, State},
};
use tracing::warn;

use super::super::AppState;
use crate::core::store::AgentPatch;

pub async fn get_agents(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.store.list_agents().await {
        Ok(agents) => Json(serde_json::json!({ "success": true, "agents": agents })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn create_agent_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.store.create_agent().await {
        Ok(agent) => Json(serde_json::json!({ "success": true, "agent": agent })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

pub async fn patch_agent_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(patch): Json<AgentPatch>,
) -> Json<serde_json::Value> {
    if let Some(topic) = &patch.topic {
        if topic.matches('#').count() > 1 {
            return Json(serde_json::json!({
                "success": false,
                "error": "Only one hashtag is allowed"
            }));
        }
    }

    let agent = match state.store.update_config(&id, &patch).await {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return Json(serde_json::json!({ "success": false, "error": "Agent not found" }));
        }
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };

    // Eligibility and delay mode may depend on what just changed, so
    // the whole schedule is recomputed.
    if let Err(e) = state.scheduler.reschedule_all().await {
        warn!("reschedule after agent update failed: {e:#}");
    }

    Json(serde_json::json!({ "success": true, "agent": agent }))
}

pub async fn delete_agent_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    let deleted = match state.store.delete_agent(&id).await {
        Ok(deleted) => deleted,
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };
    if !deleted {
        return Json(serde_json::json!({ "success": false, "error": "Agent not found" }));
    }

    if let Err(e) = state.scheduler.reschedule_all().await {
        warn!("reschedule after agent delete failed: {e:#}");
    }
    Json(serde_json::json!({ "success": true }))
}

pub async fn toggle_agent_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    let agent = match state.store.get_agent(&id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return Json(serde_json::json!({ "success": false, "error": "Agent not found" }));
        }
        Err(e) => {
            return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
        }
    };

    let paused = !agent.paused;
    if let Err(e) = state.store.set_paused(&id, paused).await {
        return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
    }
    if let Err(e) = state.scheduler.reschedule_all().await {
        warn!("reschedule after pause toggle failed: {e:#}");
    }

    Json(serde_json::json!({ "success": true, "paused": paused }))
}
