use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{post, MethodRouter},
    Json,
};
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::api::{ErrorResponse, ToolListing, ToolRequest, ToolResponse};
use crate::AppState;

pub const HELLO_MCP: &str = "hello_mcp";
pub const GET_SNIPPET: &str = "get_snippet";
pub const SAVE_SNIPPET: &str = "save_snippet";

const SNIPPET_NAME: &str = "snippetname";
const SNIPPET: &str = "snippet";
const ACCESS_KEY_PARAM: &str = "code";

/// The handler bound to a catalog tool name, if this server implements it.
pub fn tool_handler(name: &str) -> Option<MethodRouter<AppState>> {
    match name {
        HELLO_MCP => Some(post(hello_mcp)),
        GET_SNIPPET => Some(post(get_snippet)),
        SAVE_SNIPPET => Some(post(save_snippet)),
        _ => None,
    }
}

// Gate for /api/*: `?code=<key>` must match when a key is configured.
pub async fn require_access_key(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.access_key {
        let given = params.get(ACCESS_KEY_PARAM).map(String::as_str).unwrap_or_default();
        if !expected.matches(given) {
            warn!("Rejected {} without a valid access key", request.uri().path());
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "missing or invalid access key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

pub async fn list_tools(State(state): State<AppState>) -> Json<ToolListing> {
    Json(ToolListing {
        tools: state.catalog.iter().cloned().collect(),
    })
}

pub async fn hello_mcp() -> Json<ToolResponse> {
    info!("hello_mcp function executed");
    Json(ToolResponse::new("Hello I am MCPTool!"))
}

pub async fn get_snippet(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> Json<ToolResponse> {
    let Some(name) = request.arg(SNIPPET_NAME).filter(|n| !n.is_empty()) else {
        return Json(ToolResponse::new("No snippet name provided"));
    };

    // An empty blob reads the same as a missing one.
    let content = match state.store.get(&name).await {
        Ok(Some(content)) if !content.is_empty() => content,
        Ok(_) => "Snippet not found".to_string(),
        Err(e) => {
            error!("Error retrieving snippet '{}': {}", name, e);
            return Json(ToolResponse::new("Error retrieving snippet"));
        }
    };

    info!("Retrieved snippet '{}': {}", name, content);
    Json(ToolResponse::new(content))
}

pub async fn save_snippet(
    State(state): State<AppState>,
    Json(request): Json<ToolRequest>,
) -> Json<ToolResponse> {
    let Some(name) = request.arg(SNIPPET_NAME).filter(|n| !n.is_empty()) else {
        return Json(ToolResponse::new("No snippet name provided"));
    };
    let Some(snippet) = request.arg(SNIPPET).filter(|s| !s.is_empty()) else {
        return Json(ToolResponse::new("No snippet content provided"));
    };

    if let Err(e) = state.store.put(&name, &snippet).await {
        error!("Error saving snippet '{}': {}", name, e);
        return Json(ToolResponse::new("Error saving snippet"));
    }

    info!("Saved snippet '{}': {}", name, snippet);
    Json(ToolResponse::new(format!("Snippet '{}' saved successfully", snippet)))
}
