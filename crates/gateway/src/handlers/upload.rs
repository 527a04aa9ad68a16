//! Multipart document upload handler

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    Json,
};
use regula_common::errors::{AppError, Result};
use regula_common::ingest::{self, UploadInput};
use serde::Serialize;
use uuid::Uuid;

use super::body_error;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub doc_id: Uuid,
}

/// Form fields collected from the multipart body
#[derive(Debug, Default)]
struct UploadForm {
    input_type: Option<String>,
    file: Option<(String, Vec<u8>)>,
    raw_text: Option<String>,
    url: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart, limit: usize) -> Result<Self> {
        let mut form = UploadForm::default();
        let malformed = |e: MultipartError| {
            body_error(e.status(), format!("Malformed multipart body: {}", e), limit)
        };

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "inputType" => form.input_type = Some(field.text().await.map_err(malformed)?),
                "file" => {
                    let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.file = Some((file_name, bytes.to_vec()));
                }
                "rawText" => form.raw_text = Some(field.text().await.map_err(malformed)?),
                "url" => form.url = Some(field.text().await.map_err(malformed)?),
                other => tracing::debug!(field = other, "Ignoring unknown upload field"),
            }
        }

        Ok(form)
    }

    fn into_input(self) -> Result<UploadInput> {
        let input_type = self.input_type.ok_or_else(|| missing("inputType"))?;

        match input_type.trim() {
            "pdf" => {
                let (file_name, bytes) = self.file.ok_or_else(|| missing("file"))?;
                Ok(UploadInput::Pdf { file_name, bytes })
            }
            "text" => Ok(UploadInput::Text {
                raw_text: self.raw_text.ok_or_else(|| missing("rawText"))?,
            }),
            "url" => Ok(UploadInput::Url {
                url: self.url.ok_or_else(|| missing("url"))?,
            }),
            other => Err(AppError::invalid(
                "inputType",
                format!("Unsupported inputType '{}', expected pdf, text or url", other),
            )),
        }
    }
}

fn missing(field: &str) -> AppError {
    AppError::MissingField {
        field: field.to_string(),
    }
}

/// Store an uploaded PDF, text or URL
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let limit = state.config.server.max_upload_bytes;
    let multipart =
        multipart.map_err(|rejection| body_error(rejection.status(), rejection.body_text(), limit))?;

    let input = UploadForm::read(multipart, limit).await?.into_input()?;
    let document = ingest::ingest(state.services.documents.as_ref(), input).await?;

    Ok(Json(UploadResponse {
        message: "Document uploaded successfully".to_string(),
        doc_id: document.id,
    }))
}
