use axum::{extract::State, Json};
use bullhorn_session::LoginStatus;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: LoginStatus,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.session().status().await,
        has_qr: state.login_flow().has_qr().await,
    })
}
