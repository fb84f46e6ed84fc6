//! Asset files on local disk.
//!
//! Names are random and never derived from anything the client sent; the
//! extension comes from the validated content type only.

use std::{
    io,
    path::PathBuf,
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use mime_guess::mime::{self, Mime};
use rand_core::{OsRng, RngCore};
use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
};

pub const ASSET_NAME_BYTES: usize = 32;
pub const ASSETS_PATH_SEGMENT: &str = "assets";

const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// Failure while streaming an upload into its file. `Source` means the
/// request body could not be read, `Sink` means the disk refused it.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("reading upload body: {0}")]
    Source(#[source] io::Error),
    #[error("writing asset file: {0}")]
    Sink(#[source] io::Error),
}

/// Maps an allowed thumbnail content type to its file extension.
///
/// Parameters such as `; charset=binary` are ignored. Anything other than
/// `image/jpeg` or `image/png`, including a header that does not parse,
/// yields `None`.
pub fn allowed_extension(content_type: Option<&str>) -> Option<&'static str> {
    let parsed: Mime = content_type?.trim().parse().ok()?;
    if parsed.type_() != mime::IMAGE {
        return None;
    }
    if parsed.subtype() == mime::JPEG {
        Some("jpeg")
    } else if parsed.subtype() == mime::PNG {
        Some("png")
    } else {
        None
    }
}

/// 32 bytes from the OS CSPRNG, URL-safe base64 without padding.
pub fn random_asset_name() -> String {
    let mut key = [0u8; ASSET_NAME_BYTES];
    OsRng.fill_bytes(&mut key);
    URL_SAFE_NO_PAD.encode(key)
}

#[derive(Debug, Clone)]
pub struct AssetStorage {
    root: PathBuf,
    platform_host: String,
    port: u16,
}

impl AssetStorage {
    pub fn new(root: impl Into<PathBuf>, platform_host: impl Into<String>, port: u16) -> Self {
        Self {
            root: root.into(),
            platform_host: platform_host.into(),
            port,
        }
    }

    /// Fresh `<random>.<ext>` file name.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", random_asset_name(), extension)
    }

    /// Public locator for a stored asset.
    pub fn asset_url(&self, file_name: &str) -> String {
        format!(
            "http://{}:{}/{}/{}",
            self.platform_host, self.port, ASSETS_PATH_SEGMENT, file_name
        )
    }

    /// Maps a requested file name back to a path under the root. Names that
    /// could escape the root are refused.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.is_empty()
            || file_name.starts_with('.')
            || file_name.contains(['/', '\\'])
            || file_name.contains("..")
        {
            return None;
        }
        Some(self.root.join(file_name))
    }

    /// Streams `body` into `<root>/<file_name>`.
    ///
    /// The file must not already exist. On any error the partial file is
    /// removed before returning.
    pub async fn write_asset<R>(&self, file_name: &str, body: R) -> Result<PathBuf, WriteError>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.root.join(file_name);
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(WriteError::Sink)?;

        if let Err(err) = copy_into(file, body).await {
            if let Err(cleanup) = fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial asset");
            }
            return Err(err);
        }

        Ok(path)
    }

    /// Best-effort delete used when a later step fails.
    pub async fn remove_asset(&self, file_name: &str) {
        let path = self.root.join(file_name);
        if let Err(err) = fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove orphaned asset");
        }
    }
}

async fn copy_into<R>(mut file: fs::File, mut body: R) -> Result<u64, WriteError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_BYTES];
    let mut written = 0u64;
    loop {
        let read = body.read(&mut buf).await.map_err(WriteError::Source)?;
        if read == 0 {
            break;
        }
        file.write_all(&buf[..read])
            .await
            .map_err(WriteError::Sink)?;
        written += read as u64;
    }
    file.flush().await.map_err(WriteError::Sink)?;
    Ok(written)
}
