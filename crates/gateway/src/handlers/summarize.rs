//! Summarization handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use regula_common::errors::Result;
use regula_common::summary::{parse_sections, SummarySections};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::parse_body;
use crate::AppState;

/// Body of `POST /summarize`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    #[validate(length(max = 128))]
    pub doc_id: String,
}

#[derive(Serialize)]
pub struct SummarizeResponse {
    /// Raw model output
    pub summary: String,
    /// The same text split under its four headings
    pub sections: SummarySections,
}

/// Summarize an uploaded document
pub async fn summarize(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<SummarizeResponse>> {
    let request = parse_body(payload, state.config.server.max_upload_bytes)?;

    let summary = state.services.summarize.summarize(&request.doc_id).await?;
    let sections = parse_sections(&summary);
    regula_common::metrics::record_summary(sections.is_structured());

    if !sections.is_structured() {
        tracing::warn!(doc_id = %request.doc_id, "Summary did not follow the section layout");
    }

    Ok(Json(SummarizeResponse { summary, sections }))
}
