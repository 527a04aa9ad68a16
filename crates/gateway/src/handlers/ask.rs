//! Question answering handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use regula_common::errors::Result;
use regula_common::services::Answer;
use serde::Deserialize;
use validator::Validate;

use super::parse_body;
use crate::AppState;

/// Body of `POST /ask`
///
/// Missing fields deserialize as empty strings so that the service reports
/// them as invalid requests.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    #[validate(length(max = 128))]
    pub doc_id: String,

    #[serde(default)]
    #[validate(length(max = 4000))]
    pub question: String,
}

/// Answer a question about an uploaded document
pub async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>> {
    let request = parse_body(payload, state.config.server.max_upload_bytes)?;

    let answer = state
        .services
        .qa
        .answer_question(&request.doc_id, &request.question)
        .await?;

    Ok(Json(answer))
}
