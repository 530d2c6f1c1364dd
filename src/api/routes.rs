//! API route definitions

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::{Bytes, BytesMut};
use image::DynamicImage;

use super::shared::SharedStateHandle;
use super::types::*;
use crate::border::{parse_hex_color, BorderSettingsUpdate};
use crate::compositor::{self, BorderPreviewSettings};
use crate::gallery::{GalleryStore, StorageError};
use crate::grid::GridLayout;
use crate::media::{self, UploadError, UploadPolicy};
use crate::uploads::{self, StoreError};

/// Room for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the API router with all endpoints
pub fn create_router(state: SharedStateHandle) -> Router {
    let upload_limit = state.config.max_upload_bytes as usize + MULTIPART_OVERHEAD;

    Router::new()
        // Status
        .route("/api/status", get(status_handler))
        // Uploads
        .route("/api/upload", post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/api/images", get(list_images))
        .route("/api/images/:filename", delete(delete_image))
        .route("/uploads/*path", get(serve_upload))
        // Gallery and settings
        .route("/api/gallery", get(get_gallery).post(add_gallery_image).delete(remove_gallery_image))
        .route("/api/gallery/current", put(set_current_image))
        .route("/api/settings", get(get_settings).put(update_settings))
        // Rendered previews
        .route("/api/preview/grid", get(grid_preview))
        .route("/api/preview/border", get(border_preview))
        // WebSocket endpoint for state changes
        .route("/ws", get(super::websocket::ws_handler))
        .with_state(state)
}

// ============================================================================
// Status Handlers
// ============================================================================

async fn status_handler(State(state): State<SharedStateHandle>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        read_only: state.config.read_only,
    })
}

// ============================================================================
// Upload Handlers
// ============================================================================

/// An `image` field read into memory
struct ReceivedImage {
    file_name: String,
    mime: String,
    bytes: Bytes,
}

fn multipart_error(err: axum::extract::multipart::MultipartError, policy: &UploadPolicy) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { size: policy.max_bytes + 1, limit: policy.max_bytes }
    } else {
        UploadError::Malformed(err.body_text())
    }
}

/// Find the `image` field, check its MIME type, then stream it in while
/// enforcing the size limit.
async fn receive_image(multipart: &mut Multipart, policy: &UploadPolicy) -> Result<ReceivedImage, UploadError> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_error(e, policy))? {
        if field.name() != Some("image") {
            continue;
        }

        let mime = field.content_type().unwrap_or("application/octet-stream").to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        policy.check_mime(&mime)?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, policy))? {
            policy.check_size((buf.len() + chunk.len()) as u64)?;
            buf.extend_from_slice(&chunk);
        }

        return Ok(ReceivedImage { file_name, mime, bytes: buf.freeze() });
    }
    Err(UploadError::MissingFile)
}

async fn upload_handler(
    State(state): State<SharedStateHandle>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Upload without multipart body: {}", e);
        ApiError::from_upload(&UploadError::MissingFile)
    })?;

    let received = receive_image(&mut multipart, &state.policy).await.map_err(|e| {
        tracing::warn!("Upload rejected: {}", e);
        ApiError::from_upload(&e)
    })?;

    tracing::info!(
        original_name = %received.file_name,
        mime = %received.mime,
        size = received.bytes.len(),
        "Upload received"
    );

    let stored = state
        .uploads
        .save(&received.file_name, &received.bytes)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store upload: {}", e);
            match e {
                StoreError::Io(io) => ApiError::from_upload(&UploadError::Write(io)),
                other => ApiError::from_store(&other, "上传失败"),
            }
        })?;

    Ok(Json(UploadResponse {
        success: true,
        is_vercel: Some(stored.file_path.is_none()),
        file_path: stored.file_path,
        filename: stored.filename,
        image_data_url: Some(media::to_data_url(&received.mime, &received.bytes)),
    }))
}

async fn list_images(State(state): State<SharedStateHandle>) -> Result<Json<ImageListResponse>, ApiError> {
    let images = state.uploads.list().await.map_err(|e| {
        tracing::error!("Failed to list uploads: {}", e);
        ApiError::from_store(&e, "读取图片列表失败")
    })?;
    tracing::debug!(count = images.len(), "Listed uploads");
    Ok(Json(ImageListResponse { success: true, images }))
}

async fn delete_image(
    State(state): State<SharedStateHandle>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.uploads.delete(&filename).await.map_err(|e| {
        tracing::warn!("Delete of {:?} failed: {}", filename, e);
        ApiError::from_store(&e, "删除文件失败")
    })?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "文件删除成功".to_string(),
        filename,
    }))
}

async fn serve_upload(State(state): State<SharedStateHandle>, Path(path): Path<String>) -> Response {
    if state.uploads.is_read_only() {
        return ApiError::not_found("File not found")
            .with_message("Uploads are not persisted on this deployment. Use the imageDataUrl from the upload response instead.")
            .into_response();
    }

    match state.uploads.read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, media::content_type_for(&path)),
                (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::debug!("Static upload {:?} not served: {}", path, e);
            ApiError::from_store(&e, "读取文件失败").into_response()
        }
    }
}

// ============================================================================
// Gallery Handlers
// ============================================================================

fn gallery_response(state: &SharedStateHandle) -> GalleryResponse {
    let snapshot = state.gallery.snapshot();
    GalleryResponse {
        success: true,
        current_image: snapshot.current_image,
        images: snapshot.gallery,
    }
}

async fn get_gallery(State(state): State<SharedStateHandle>) -> Json<GalleryResponse> {
    Json(gallery_response(&state))
}

/// Run a gallery mutation on the blocking pool; storage writes hit the disk.
async fn gallery_write<T, F>(state: &SharedStateHandle, mutate: F) -> Result<T, ApiError>
where
    F: FnOnce(&GalleryStore) -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || mutate(&state.gallery))
        .await
        .map_err(|e| ApiError::internal("保存图库失败").with_message(e.to_string()))?
        .map_err(|e| {
            tracing::error!("Gallery persistence failed: {}", e);
            ApiError::from_storage(&e)
        })
}

async fn add_gallery_image(
    State(state): State<SharedStateHandle>,
    Json(req): Json<GalleryImageRequest>,
) -> Result<(StatusCode, Json<GalleryResponse>), ApiError> {
    let added = gallery_write(&state, move |gallery| gallery.add_to_gallery(&req.image)).await?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(gallery_response(&state))))
}

/// Remove from the gallery; server-stored uploads are deleted from disk too.
async fn remove_gallery_image(
    State(state): State<SharedStateHandle>,
    Json(req): Json<GalleryImageRequest>,
) -> Result<Json<GalleryResponse>, ApiError> {
    let image = req.image.clone();
    let removed = gallery_write(&state, move |gallery| gallery.delete_image(&image)).await?;
    if !removed {
        return Err(ApiError::not_found("图片不在图库中"));
    }

    if uploads::is_server_path(&req.image) {
        let filename = uploads::filename_from_path(&req.image);
        match state.uploads.delete(filename).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => tracing::warn!("Gallery entry removed but upload {:?} was not deleted: {}", filename, e),
        }
    }

    Ok(Json(gallery_response(&state)))
}

async fn set_current_image(
    State(state): State<SharedStateHandle>,
    Json(req): Json<CurrentImageRequest>,
) -> Result<Json<GalleryResponse>, ApiError> {
    gallery_write(&state, move |gallery| {
        if req.add_to_gallery {
            gallery.set_uploaded_image(req.image).map(|_| ())
        } else {
            gallery.select_image(req.image)
        }
    })
    .await?;
    Ok(Json(gallery_response(&state)))
}

async fn get_settings(State(state): State<SharedStateHandle>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        success: true,
        settings: state.gallery.settings(),
    })
}

async fn update_settings(
    State(state): State<SharedStateHandle>,
    Json(update): Json<BorderSettingsUpdate>,
) -> Json<SettingsResponse> {
    let settings = state.gallery.update_settings(&update);
    tracing::debug!(?settings, "Settings updated");
    Json(SettingsResponse { success: true, settings })
}

// ============================================================================
// Preview Handlers
// ============================================================================

/// Load a gallery image (data URL or `/uploads/` path) for rendering
async fn load_image(state: &SharedStateHandle, source: &str) -> Result<DynamicImage, ApiError> {
    let bytes = if let Some((_, bytes)) = media::decode_data_url(source) {
        bytes
    } else if uploads::is_server_path(source) {
        let filename = uploads::filename_from_path(source);
        state
            .uploads
            .read(filename)
            .await
            .map_err(|e| ApiError::from_store(&e, "读取文件失败"))?
    } else {
        return Err(ApiError::bad_request("不支持的图片来源"));
    };

    tokio::task::spawn_blocking(move || media::decode_image(&bytes))
        .await
        .map_err(|e| ApiError::internal("图片解码失败").with_message(e.to_string()))?
        .map_err(|e| ApiError::bad_request("图片解码失败").with_message(e.to_string()))
}

fn png_response(png: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png"), (header::CACHE_CONTROL, "no-store")], png).into_response()
}

async fn grid_preview(
    State(state): State<SharedStateHandle>,
    Query(query): Query<GridPreviewQuery>,
) -> Result<Response, ApiError> {
    let mut settings = state.gallery.settings();
    settings.apply(&BorderSettingsUpdate {
        border_width: None,
        grid_count_x: query.grid_count_x,
        grid_count_y: query.grid_count_y,
        grid_size: query.grid_size,
        is_reversed: query.is_reversed,
        filling_color: query.filling_color,
    });

    let image = match query.image.or_else(|| state.gallery.current_image()) {
        Some(source) => Some(load_image(&state, &source).await?),
        None => None,
    };

    let layout = GridLayout::from_settings(&settings);
    if parse_hex_color(&settings.filling_color).is_none() {
        tracing::debug!(color = %settings.filling_color, "Unparsable fill colour, using default");
    }
    let fill = settings.fill_rgba();

    let png = tokio::task::spawn_blocking(move || {
        layout
            .render(image.as_ref(), fill)
            .map_err(|e| ApiError::from_grid(&e))
            .and_then(|canvas| media::encode_png(&canvas).map_err(|e| ApiError::internal("图片编码失败").with_message(e.to_string())))
    })
    .await
    .map_err(|e| ApiError::internal("预览渲染失败").with_message(e.to_string()))??;

    Ok(png_response(png))
}

async fn border_preview(
    State(state): State<SharedStateHandle>,
    Query(query): Query<BorderPreviewQuery>,
) -> Result<Response, ApiError> {
    let defaults = BorderPreviewSettings {
        border_width: state.gallery.settings().border_width,
        ..BorderPreviewSettings::default()
    };
    let preview = BorderPreviewSettings {
        border_width: query.border_width.unwrap_or(defaults.border_width),
        canvas_width: query.canvas_width.unwrap_or(defaults.canvas_width),
        canvas_height: query.canvas_height.unwrap_or(defaults.canvas_height),
        pattern_scale: query.pattern_scale.unwrap_or(defaults.pattern_scale),
    };

    let source = query
        .image
        .or_else(|| state.gallery.current_image())
        .ok_or_else(|| ApiError::bad_request("没有可用的图片"))?;
    let image = load_image(&state, &source).await?;

    let png = tokio::task::spawn_blocking(move || {
        compositor::composite_border(&image, &preview)
            .map_err(|e| ApiError::from_composite(&e))
            .and_then(|canvas| media::encode_png(&canvas).map_err(|e| ApiError::internal("图片编码失败").with_message(e.to_string())))
    })
    .await
    .map_err(|e| ApiError::internal("预览渲染失败").with_message(e.to_string()))??;

    Ok(png_response(png))
}
