//! Document upload and lookup endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::{decode_text, extract_pdf_pages, is_pdf};
use crate::server::state::AppState;
use crate::types::{DocumentInfo, UploadSummary, UploadTextRequest};

/// Resolve the caller's document id, generating one when absent
fn document_id_or_new(document_id: Option<String>) -> String {
    match document_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// POST /api/upload - Upload a PDF or text file
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>> {
    let mut document_id = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "document_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::validation(format!("Failed to read document_id: {}", e)))?;
                document_id = Some(value);
            }
            "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.txt".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::validation(format!("Failed to read file: {}", e)))?;
                file = Some((filename, data));
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let (filename, data) = file.ok_or_else(|| Error::validation("multipart field 'file' is required"))?;
    let document_id = document_id_or_new(document_id);

    tracing::info!("Upload {} ({} bytes) as document {}", filename, data.len(), document_id);

    let summary = if is_pdf(&filename, &data) {
        let name = filename.clone();
        let pages = tokio::task::spawn_blocking(move || extract_pdf_pages(&name, &data))
            .await
            .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))??;
        state.pipeline().upload_pages(&document_id, pages.as_slice()).await?
    } else {
        let text = decode_text(&filename, &data)?;
        state.pipeline().upload_text(&document_id, &text).await?
    };

    Ok(Json(summary))
}

/// POST /api/documents - Upload already-extracted text
pub async fn upload_text(
    State(state): State<AppState>,
    Json(request): Json<UploadTextRequest>,
) -> Result<Json<UploadSummary>> {
    let document_id = document_id_or_new(request.document_id);

    let summary = match (request.pages, request.text) {
        (Some(pages), _) => state.pipeline().upload_pages(&document_id, pages.as_slice()).await?,
        (None, Some(text)) => state.pipeline().upload_text(&document_id, &text).await?,
        (None, None) => return Err(Error::validation("either 'pages' or 'text' is required")),
    };

    Ok(Json(summary))
}

/// GET /api/documents - List indexed document ids
pub async fn list_documents(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ids = state.pipeline().store().document_ids();
    let total = ids.len();
    Json(serde_json::json!({
        "documents": ids,
        "total": total,
    }))
}

/// GET /api/documents/:id - Get document details
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentInfo>> {
    Ok(Json(state.pipeline().document_info(&id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_or_new() {
        assert_eq!(document_id_or_new(Some(" report ".to_string())), "report");

        let generated = document_id_or_new(Some("  ".to_string()));
        assert!(Uuid::parse_str(&generated).is_ok());
        assert!(Uuid::parse_str(&document_id_or_new(None)).is_ok());
    }
}
