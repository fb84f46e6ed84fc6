//! HTTP surface: thumbnail upload and asset download.

use std::{io, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State, multipart::Field},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::TryStreamExt;
use mime_guess::MimeGuess;
use tokio::{fs::File, io::AsyncRead};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::{
    metadata::VideoRecord,
    upload::{THUMBNAIL_FIELD, ThumbnailUpload, ThumbnailUploader, UploadError, parse_video_id},
};

#[derive(Clone)]
struct AppState {
    uploader: Arc<ThumbnailUploader>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let (status, message) = match &err {
            UploadError::InvalidIdentifier(_) => (StatusCode::BAD_REQUEST, "Invalid ID"),
            UploadError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "Couldn't find JWT"),
            UploadError::InvalidCredential(_) => {
                (StatusCode::UNAUTHORIZED, "Couldn't validate JWT")
            }
            UploadError::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "Couldn't parse request"),
            UploadError::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Wrong media type")
            }
            UploadError::StorageFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Couldn't store thumbnail")
            }
            UploadError::RecordNotFound(_) => (StatusCode::NOT_FOUND, "Couldn't find video"),
            UploadError::Forbidden => (StatusCode::FORBIDDEN, "Not the owner of this video"),
            UploadError::PersistenceFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Couldn't update video")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "{message}");
        } else {
            tracing::warn!(error = %err, "{message}");
        }

        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(uploader: ThumbnailUploader, max_upload_bytes: usize) -> Router {
    let state = AppState {
        uploader: Arc::new(uploader),
    };

    Router::new()
        .route("/api/thumbnail_upload/{video_id}", post(upload_thumbnail))
        .route("/assets/{file}", get(download_asset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn upload_thumbnail(
    State(state): State<AppState>,
    AxumPath(video_id): AxumPath<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<VideoRecord>> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = state.uploader.authenticate(&headers)?;
    tracing::info!(%video_id, %user_id, "uploading thumbnail");

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::MalformedRequest(err.body_text()))?
    {
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }
        let video = state
            .uploader
            .upload_thumbnail(video_id, user_id, field_upload(field))
            .await?;
        return Ok(Json(video));
    }

    Err(UploadError::MalformedRequest(format!("missing `{THUMBNAIL_FIELD}` file field")).into())
}

fn field_upload(field: Field<'_>) -> ThumbnailUpload<impl AsyncRead + Unpin + '_> {
    let content_type = field.content_type().map(str::to_owned);
    let file_name = field.file_name().map(str::to_owned);
    ThumbnailUpload {
        content_type,
        file_name,
        body: StreamReader::new(Box::pin(field.map_err(io::Error::other))),
    }
}

async fn download_asset(
    State(state): State<AppState>,
    AxumPath(file): AxumPath<String>,
) -> ApiResult<Response> {
    let path = state
        .uploader
        .storage()
        .resolve(&file)
        .ok_or_else(|| ApiError::not_found("asset not found"))?;
    stream_file(path).await
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("asset not found"))?;

    let stream = ReaderStream::new(file);
    let mut response = Body::from_stream(stream).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}
