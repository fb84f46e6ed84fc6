//! Runtime configuration shared by the backend and the `aspect_ratio` CLI.
//!
//! Values come from a `KEY=VALUE` env file (`/etc/tubely-env` by default) and
//! can be overridden by process environment variables of the same name.

use anyhow::{Context, Result, anyhow};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tubely-env";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8091;
pub const DEFAULT_PLATFORM_HOST: &str = "localhost";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 << 20;
pub const DEFAULT_FFPROBE_PATH: &str = "ffprobe";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

const KNOWN_KEYS: &[&str] = &[
    "ASSETS_ROOT",
    "DB_PATH",
    "JWT_SECRET",
    "HOST",
    "PORT",
    "PLATFORM_HOST",
    "MAX_UPLOAD_BYTES",
    "FFPROBE_PATH",
    "PROBE_TIMEOUT_SECS",
];

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub assets_root: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub jwt_secret: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub platform_host: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub ffprobe_path: Option<PathBuf>,
    pub probe_timeout_secs: Option<u64>,
}

impl EnvConfig {
    /// Applies a single key. Unknown keys are ignored so the same file can
    /// carry settings for other services.
    fn apply(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        match key {
            "ASSETS_ROOT" => self.assets_root = Some(PathBuf::from(value)),
            "DB_PATH" => self.db_path = Some(PathBuf::from(value)),
            "JWT_SECRET" => {
                if !value.is_empty() {
                    self.jwt_secret = Some(value.to_string());
                }
            }
            "HOST" => {
                if !value.is_empty() {
                    self.host = Some(value.to_string());
                }
            }
            "PORT" => {
                let port: u16 = value
                    .parse()
                    .with_context(|| format!("Parsing PORT from {origin}"))?;
                self.port = Some(port);
            }
            "PLATFORM_HOST" => {
                if !value.is_empty() {
                    self.platform_host = Some(value.to_string());
                }
            }
            "MAX_UPLOAD_BYTES" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Parsing MAX_UPLOAD_BYTES from {origin}"))?;
                self.max_upload_bytes = Some(limit);
            }
            "FFPROBE_PATH" => {
                if !value.is_empty() {
                    self.ffprobe_path = Some(PathBuf::from(value));
                }
            }
            "PROBE_TIMEOUT_SECS" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Parsing PROBE_TIMEOUT_SECS from {origin}"))?;
                self.probe_timeout_secs = Some(secs);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Fully resolved backend settings, injected into the uploader and the HTTP
/// layer. The probe settings stay on [`EnvConfig`] for the CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub assets_root: PathBuf,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub platform_host: String,
    pub max_upload_bytes: usize,
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let origin = path.display().to_string();
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            cfg.apply(key.trim(), value, &origin)?;
        }
    }
    Ok(Some(cfg))
}

pub fn load_app_config() -> Result<AppConfig> {
    load_app_config_from(Path::new(DEFAULT_CONFIG_PATH), |key| env::var(key).ok())
}

/// Builds an [`AppConfig`] from the env file at `path`, letting `lookup`
/// override any key. Tests pass a closure instead of touching the real
/// process environment.
pub fn load_app_config_from<F>(path: impl AsRef<Path>, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    let mut cfg = read_env_config(path)?.unwrap_or_default();
    for &key in KNOWN_KEYS {
        if let Some(value) = lookup(key) {
            cfg.apply(key, value.trim(), "environment")?;
        }
    }

    let assets_root = cfg
        .assets_root
        .ok_or_else(|| anyhow!("ASSETS_ROOT not set in {} or environment", path.display()))?;
    let db_path = cfg
        .db_path
        .ok_or_else(|| anyhow!("DB_PATH not set in {} or environment", path.display()))?;
    let jwt_secret = cfg
        .jwt_secret
        .ok_or_else(|| anyhow!("JWT_SECRET not set in {} or environment", path.display()))?;

    Ok(AppConfig {
        assets_root,
        db_path,
        jwt_secret,
        host: cfg.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: cfg.port.unwrap_or(DEFAULT_PORT),
        platform_host: cfg
            .platform_host
            .unwrap_or_else(|| DEFAULT_PLATFORM_HOST.to_string()),
        max_upload_bytes: cfg.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn read_env_config_extracts_port() {
        let cfg = make_config("ASSETS_ROOT=\"/assets\"\nPORT=\"4242\"\n# PORT=1\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.port, Some(4242));
        assert_eq!(parsed.assets_root, Some(PathBuf::from("/assets")));
    }

    #[test]
    fn load_app_config_applies_defaults() {
        let cfg = make_config("ASSETS_ROOT=\"/a\"\nDB_PATH=\"/d/tubely.db\"\nJWT_SECRET=\"s3cret\"\n");
        let config = load_app_config_from(cfg.path(), no_env).unwrap();
        assert_eq!(config.assets_root, PathBuf::from("/a"));
        assert_eq!(config.db_path, PathBuf::from("/d/tubely.db"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.platform_host, DEFAULT_PLATFORM_HOST);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn environment_overrides_file_values() {
        let cfg = make_config("ASSETS_ROOT=\"/a\"\nDB_PATH=\"/d\"\nJWT_SECRET=\"file\"\nPORT=1000\n");
        let env: HashMap<&str, &str> = [("PORT", "2000"), ("JWT_SECRET", "env")].into();
        let config =
            load_app_config_from(cfg.path(), |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.port, 2000);
        assert_eq!(config.jwt_secret, "env");
    }

    #[test]
    fn missing_file_uses_environment_only() {
        let dir = tempfile::tempdir().unwrap();
        let env: HashMap<&str, &str> =
            [("ASSETS_ROOT", "/a"), ("DB_PATH", "/d"), ("JWT_SECRET", "x")].into();
        let config = load_app_config_from(dir.path().join("absent"), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.jwt_secret, "x");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let cfg = make_config("ASSETS_ROOT=\"/a\"\nDB_PATH=\"/d\"\nJWT_SECRET=\"\"\n");
        let err = load_app_config_from(cfg.path(), no_env).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn bad_port_names_the_key() {
        let cfg = make_config("PORT=abc\n");
        let err = read_env_config(cfg.path()).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
