//! Roster listing and refresh.

use axum::{
    extract::{Query, State},
    Json,
};
use bullhorn_session::Recipient;
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatsQuery {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub chats: Vec<Recipient>,
}

/// Case-insensitive substring filter over the cached roster. An empty or
/// missing search term returns the full roster; a term matching nothing
/// returns an empty list, never an error.
pub async fn list_chats(
    State(state): State<AppState>,
    Query(params): Query<ChatsQuery>,
) -> Json<ChatsResponse> {
    let mut chats = state.session().roster().await;
    if let Some(term) = params.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let needle = term.to_lowercase();
        chats.retain(|chat| chat.display_name.to_lowercase().contains(&needle));
    }
    Json(ChatsResponse { chats })
}

#[derive(Debug, Serialize)]
pub struct RefreshChatsResponse {
    pub message: String,
    pub count: usize,
}

pub async fn refresh_chats(
    State(state): State<AppState>,
) -> Result<Json<RefreshChatsResponse>, ApiError> {
    state.require_session().await?;

    let count = state.login_flow().refresh_roster().await?;
    Ok(Json(RefreshChatsResponse {
        message: "chat list refreshed".to_string(),
        count,
    }))
}
