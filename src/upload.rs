//! Thumbnail upload flow.
//!
//! The HTTP layer parses the path id, authenticates and pulls the
//! `thumbnail` multipart field; [`ThumbnailUploader::upload_thumbnail`] then
//! validates the content type, checks ownership, writes the file and points
//! the video's `thumbnail_url` at it.
//!
//! The file is only written once the caller is known to own the video, and a
//! failed record update removes the file again, so rejected requests do not
//! leave orphaned assets behind.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;
use thiserror::Error;
use tokio::{io::AsyncRead, task};
use uuid::Uuid;

use crate::{
    auth::{self, AuthError},
    config::AppConfig,
    metadata::{VideoRecord, VideoStore},
    storage::{AssetStorage, WriteError, allowed_extension},
};

/// Name of the multipart field carrying the image.
pub const THUMBNAIL_FIELD: &str = "thumbnail";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid video id: {0}")]
    InvalidIdentifier(#[source] uuid::Error),
    #[error("couldn't find JWT: {0}")]
    Unauthenticated(#[source] AuthError),
    #[error("couldn't validate JWT: {0}")]
    InvalidCredential(#[source] AuthError),
    #[error("couldn't parse request: {0}")]
    MalformedRequest(String),
    #[error("unsupported media type {0:?}, expected image/jpeg or image/png")]
    UnsupportedMediaType(String),
    #[error("couldn't store thumbnail: {0}")]
    StorageFailure(String),
    #[error("couldn't find video {0}")]
    RecordNotFound(Uuid),
    #[error("video does not belong to the authenticated user")]
    Forbidden,
    #[error("couldn't update video: {0}")]
    PersistenceFailure(String),
}

/// The file field of an upload request. `file_name` is whatever the client
/// declared and is only used for logging.
pub struct ThumbnailUpload<R> {
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub body: R,
}

pub fn parse_video_id(raw: &str) -> Result<Uuid, UploadError> {
    Uuid::parse_str(raw).map_err(UploadError::InvalidIdentifier)
}

#[derive(Clone)]
pub struct ThumbnailUploader {
    store: Arc<dyn VideoStore>,
    storage: AssetStorage,
    jwt_secret: String,
}

impl ThumbnailUploader {
    pub fn new(
        store: Arc<dyn VideoStore>,
        storage: AssetStorage,
        jwt_secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            storage,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn VideoStore>) -> Self {
        let storage = AssetStorage::new(
            config.assets_root.clone(),
            config.platform_host.clone(),
            config.port,
        );
        Self::new(store, storage, config.jwt_secret.clone())
    }

    pub fn storage(&self) -> &AssetStorage {
        &self.storage
    }

    /// Resolves the bearer token in `headers` to a user id.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Uuid, UploadError> {
        let token = auth::bearer_token(headers).map_err(UploadError::Unauthenticated)?;
        auth::validate_jwt(token, &self.jwt_secret).map_err(UploadError::InvalidCredential)
    }

    #[tracing::instrument(
        skip(self, upload),
        fields(content_type = ?upload.content_type, declared_name = ?upload.file_name)
    )]
    pub async fn upload_thumbnail<R>(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        upload: ThumbnailUpload<R>,
    ) -> Result<VideoRecord, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let extension = allowed_extension(upload.content_type.as_deref()).ok_or_else(|| {
            UploadError::UnsupportedMediaType(upload.content_type.clone().unwrap_or_default())
        })?;
        let file_name = self.storage.file_name(extension);

        let mut video = self.fetch_video(video_id).await?;
        if video.user_id != user_id {
            tracing::warn!(owner = %video.user_id, "thumbnail upload by non-owner rejected");
            return Err(UploadError::Forbidden);
        }

        let path = self
            .storage
            .write_asset(&file_name, upload.body)
            .await
            .map_err(|err| match err {
                WriteError::Source(err) => {
                    UploadError::MalformedRequest(format!("reading thumbnail body: {err}"))
                }
                WriteError::Sink(err) => UploadError::StorageFailure(err.to_string()),
            })?;
        tracing::debug!(path = %path.display(), "thumbnail written");

        video.thumbnail_url = Some(self.storage.asset_url(&file_name));
        video.updated_at = Utc::now();
        if let Err(err) = self.persist_video(video.clone()).await {
            self.storage.remove_asset(&file_name).await;
            return Err(err);
        }

        tracing::info!(%file_name, "thumbnail uploaded");
        Ok(video)
    }

    async fn fetch_video(&self, video_id: Uuid) -> Result<VideoRecord, UploadError> {
        let store = self.store.clone();
        let result = task::spawn_blocking(move || store.get_video(video_id))
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "video lookup task failed");
                UploadError::RecordNotFound(video_id)
            })?;

        match result {
            Ok(Some(video)) => Ok(video),
            Ok(None) => Err(UploadError::RecordNotFound(video_id)),
            Err(err) => {
                let detail = format!("{err:#}");
                tracing::error!(error = %detail, "video lookup failed");
                Err(UploadError::RecordNotFound(video_id))
            }
        }
    }

    async fn persist_video(&self, video: VideoRecord) -> Result<(), UploadError> {
        let store = self.store.clone();
        task::spawn_blocking(move || store.update_video(&video))
            .await
            .map_err(|err| UploadError::PersistenceFailure(format!("task join error: {err}")))?
            .map_err(|err| UploadError::PersistenceFailure(format!("{err:#}")))
    }
}
