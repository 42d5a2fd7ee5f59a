//! Document upload endpoint.
//!
//! Accepts a multipart file, extracts its text and runs a full analysis
//! synchronously so the caller gets the result in the response body.

use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use sensei_core::SessionId;

use crate::routes::ApiError;
use crate::server::AppState;

const TEXT_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "cpp", "c", "h", "hpp", "go", "rs",
    "rb", "php", "html", "css", "sql", "txt", "md",
];

const MIN_CONTENT_CHARS: usize = 10;

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut payload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .unwrap_or("upload")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::bad_request(format!("failed to read file: {err}")))?;
            payload = Some((filename, bytes.to_vec()));
            break;
        }
    }

    let Some((filename, bytes)) = payload else {
        return Err(ApiError::bad_request("missing 'file' field"));
    };

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let content = extract_text(&extension, &bytes)?;
    if content.trim().chars().count() < MIN_CONTENT_CHARS {
        return Err(ApiError::bad_request(
            "file contains too little text to analyze",
        ));
    }

    info!(filename = %filename, bytes = bytes.len(), "analyzing uploaded file");

    let analysis = state.engine.analyze(&content, &filename, &filename).await;
    let session_id = SessionId::new();
    if let Err(err) = state.store.store_session(&session_id, &content, &analysis).await {
        warn!(error = %err, "failed to persist uploaded session");
        return Err(err.into());
    }

    Ok(Json(json!({
        "success": true,
        "session_id": session_id.as_str(),
        "filename": filename,
        "file_type": extension,
        "analysis": analysis,
        "timestamp": Utc::now(),
    })))
}

fn extract_text(extension: &str, bytes: &[u8]) -> Result<String, ApiError> {
    if extension == "pdf" {
        return pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| ApiError::bad_request(format!("could not extract PDF text: {err}")));
    }
    if !TEXT_EXTENSIONS.contains(&extension) {
        return Err(ApiError::bad_request(format!(
            "unsupported file type '.{extension}'"
        )));
    }
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => Ok(text),
        // Latin-1 never fails to decode; every byte maps to a char
        Err(err) => Ok(err.into_bytes().iter().map(|b| *b as char).collect()),
    }
}
