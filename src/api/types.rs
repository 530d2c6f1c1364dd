//! API request/response types
//!
//! These types are used for JSON serialization in API endpoints. Field names
//! are camelCase to match what the browser front-ends already consume.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::border::BorderSettings;
use crate::compositor::CompositeError;
use crate::gallery::StorageError;
use crate::grid::GridError;
use crate::media::UploadError;
use crate::uploads::{ImageEntry, StoreError};

// ============================================================================
// Status Types
// ============================================================================

/// Server status response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub read_only: bool,
}

// ============================================================================
// Upload Types
// ============================================================================

/// `POST /api/upload` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_path: Option<String>,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_vercel: Option<bool>,
}

/// `GET /api/images` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageListResponse {
    pub success: bool,
    pub images: Vec<ImageEntry>,
}

/// `DELETE /api/images/:filename` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
}

// ============================================================================
// Gallery Types
// ============================================================================

/// Body naming a single gallery image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryImageRequest {
    pub image: String,
}

/// Body for selecting the current image (`null` clears it)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentImageRequest {
    pub image: Option<String>,
    /// Also add to the gallery, as a fresh upload would
    #[serde(default)]
    pub add_to_gallery: bool,
}

/// Gallery contents plus the current selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryResponse {
    pub success: bool,
    pub current_image: Option<String>,
    pub images: Vec<String>,
}

/// Settings response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: BorderSettings,
}

// ============================================================================
// Preview Types
// ============================================================================

/// Query for `GET /api/preview/grid`; unset fields come from the stored settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPreviewQuery {
    pub image: Option<String>,
    pub grid_count_x: Option<u32>,
    pub grid_count_y: Option<u32>,
    pub grid_size: Option<u32>,
    pub is_reversed: Option<bool>,
    pub filling_color: Option<String>,
}

/// Query for `GET /api/preview/border`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderPreviewQuery {
    pub image: Option<String>,
    pub border_width: Option<u32>,
    pub canvas_width: Option<u32>,
    pub canvas_height: Option<u32>,
    pub pattern_scale: Option<f32>,
}

// ============================================================================
// Errors
// ============================================================================

/// JSON error body: `{success:false, error, message?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: None,
            filename: None,
            status: status.as_u16(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn forbidden(error: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Upload failures
    pub fn from_upload(err: &UploadError) -> Self {
        match err {
            UploadError::MissingFile => Self::bad_request("没有上传文件")
                .with_message("请检查文件大小（最大10MB）和文件类型（只允许图片）"),
            UploadError::InvalidMime(_) => Self::bad_request("只允许上传图片文件"),
            UploadError::TooLarge { limit, .. } => {
                Self::bad_request("文件太大").with_message(format!("文件大小不能超过 {}MB", limit / (1024 * 1024)))
            }
            UploadError::Malformed(msg) => Self::bad_request("上传失败").with_message(msg.clone()),
            UploadError::Write(e) => Self::internal("文件保存失败").with_message(e.to_string()),
        }
    }

    /// Upload-directory failures; `context` names the failing operation
    pub fn from_store(err: &StoreError, context: &str) -> Self {
        match err {
            StoreError::InvalidName(name) => Self::bad_request("无效的文件名").with_filename(name.clone()),
            StoreError::PathEscape(_) => Self::forbidden("无效的文件路径"),
            StoreError::NotFound(name) => Self::not_found("文件不存在").with_filename(name.clone()),
            StoreError::NotPersisted(_) => Self::internal("文件保存失败"),
            StoreError::Io(e) => Self::internal(context).with_message(e.to_string()),
        }
    }

    pub fn from_storage(err: &StorageError) -> Self {
        Self::internal("保存图库失败").with_message(err.to_string())
    }

    pub fn from_grid(err: &GridError) -> Self {
        Self::bad_request("无效的网格设置").with_message(err.to_string())
    }

    pub fn from_composite(err: &CompositeError) -> Self {
        Self::bad_request("无法绘制边框").with_message(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_shape() {
        let json = serde_json::to_value(UploadResponse {
            success: true,
            file_path: None,
            filename: "1-2.png".into(),
            image_data_url: Some("data:image/png;base64,".into()),
            is_vercel: Some(true),
        })
        .unwrap();
        assert_eq!(json["filePath"], serde_json::Value::Null);
        assert_eq!(json["imageDataUrl"], "data:image/png;base64,");
        assert_eq!(json["isVercel"], true);
    }

    #[test]
    fn test_error_mapping() {
        let err = ApiError::from_upload(&UploadError::TooLarge { size: 11 << 20, limit: 10 << 20 });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message.as_deref(), Some("文件大小不能超过 10MB"));

        let err = ApiError::from_store(&StoreError::NotFound("a.png".into()), "删除文件失败");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.filename.as_deref(), Some("a.png"));

        let json = serde_json::to_value(ApiError::bad_request("x")).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("status").is_none());
        assert!(json.get("message").is_none());
    }
}
