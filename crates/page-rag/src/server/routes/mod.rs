//! API routes for the RAG server

pub mod ask;
pub mod documents;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload - with larger body limit for files
        .route(
            "/upload",
            post(documents::upload_file).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/documents",
            get(documents::list_documents)
                .post(documents::upload_text)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents/:id", get(documents::get_document))
        .route("/ask", post(ask::ask))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "page-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Single-document question answering with page citations",
        "endpoints": {
            "POST /api/upload": "Upload a PDF or text file (multipart: file, document_id?)",
            "POST /api/documents": "Upload extracted text as JSON ({document_id?, pages | text})",
            "GET /api/documents": "List indexed documents",
            "GET /api/documents/:id": "Get document details",
            "POST /api/ask": "Ask a question; answer streams as SSE (delta, error, done)"
        }
    }))
}
