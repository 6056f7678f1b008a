use crate::error::ApiError;
use crate::extraction::Document;
use crate::middleware::Caller;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    http::HeaderMap,
    Extension, Json,
};
use base64::Engine;
use profilehub_security::{constant_time_eq, Role};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Largest decoded avatar accepted.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.ms-powerpoint",
    "text/plain",
];

const ALLOWED_DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "ppt", "pptx", "txt"];

/// Accepted by MIME type or, failing that, by file extension.
pub fn is_supported_document(file_name: &str, content_type: Option<&str>) -> bool {
    let by_type = content_type
        .is_some_and(|ct| ALLOWED_DOCUMENT_TYPES.iter().any(|allowed| ct.contains(allowed)));
    let by_extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_DOCUMENT_EXTENSIONS.contains(&ext.as_str()));
    by_type || by_extension
}

/// Strip a `data:image/<type>;base64,` prefix if present.
fn strip_data_url(image: &str) -> &str {
    let Some(rest) = image.strip_prefix("data:image/") else {
        return image;
    };
    match rest.split_once(";base64,") {
        Some((subtype, payload))
            if !subtype.is_empty()
                && subtype.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            payload.trim()
        }
        _ => image,
    }
}

/// Decode an avatar given as plain base64 or a data URL.
pub fn decode_avatar(image: &str) -> Result<Vec<u8>, ApiError> {
    let payload: String = strip_data_url(image)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| ApiError::BadRequest("Image is not valid base64".to_string()))?;
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::BadRequest("Image too large (max 5MB)".to_string()));
    }
    Ok(bytes)
}

/// File extension for an image MIME type; `image/jpeg` becomes `jpg`.
pub fn avatar_extension(mime_type: &str) -> String {
    if mime_type == "image/jpeg" {
        return "jpg".to_string();
    }
    let ext: String = mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .unwrap_or("")
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if ext.is_empty() {
        "png".to_string()
    } else {
        ext.to_ascii_lowercase()
    }
}

/// `POST /admin/upload`: forward a resume document (multipart field `file`)
/// to the extraction service.
pub async fn document_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    caller.require(Role::Admin)?;
    let extractor = state
        .extractor
        .clone()
        .ok_or(ApiError::NotConfigured("Text extraction service"))?;

    let mut document = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?;
        document = Some(Document {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let document = match document {
        Some(d) if !d.bytes.is_empty() => d,
        _ => return Err(ApiError::BadRequest("No file to upload".to_string())),
    };
    if !is_supported_document(&document.file_name, document.content_type.as_deref()) {
        return Err(ApiError::BadRequest(
            "Unsupported file type. Only PDF, DOC/DOCX, PPT/PPTX, and TXT are accepted".to_string(),
        ));
    }

    info!(
        file_name = %document.file_name,
        bytes = document.bytes.len(),
        "Forwarding document for extraction"
    );
    let mut body = serde_json::Map::new();
    body.insert("success".into(), json!(true));
    body.insert(
        "message".into(),
        json!("The file was sent to the extraction workflow"),
    );
    body.extend(extractor.extract(document).await?);
    Ok(Json(Value::Object(body)))
}

/// `POST /uploads/avatar` with `{"image": base64 | data URL, "mimeType"?}`.
pub async fn avatar_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if let Some(secret) = &state.avatar_secret {
        let presented = headers
            .get("x-n8n-avatar-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !constant_time_eq(secret.as_bytes(), presented.as_bytes()) {
            warn!("Avatar upload rejected: bad shared secret");
            return Err(ApiError::Unauthorized("Unauthorized"));
        }
    }

    let storage = state
        .avatars
        .clone()
        .ok_or(ApiError::NotConfigured("Avatar storage"))?;

    let Json(body) = body?;
    let image = match body.get("image") {
        Some(Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => return Err(ApiError::BadRequest("Missing image (base64)".to_string())),
    };
    let bytes = decode_avatar(image)?;

    let mime_type = body
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("image/png");
    let name = format!("{}.{}", Uuid::new_v4(), avatar_extension(mime_type));

    storage.put(&name, bytes, mime_type).await?;
    let url = storage.public_url(&name);
    info!(object = %name, "Avatar stored");
    Ok(Json(json!({"success": true, "url": url})))
}
