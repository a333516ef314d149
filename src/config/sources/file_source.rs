//! Async file-based config source with SHA-256 change detection.
//!
//! [`FileSource`] works for any file format: the deserializer is chosen
//! at construction time ([`FileSource::yaml`], [`FileSource::json`],
//! [`FileSource::toml`], or [`FileSource::for_path`] by extension). Each
//! load reads the file through Tokio, validates the routing config, and
//! versions it by the hash of the raw bytes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::RoutemuxError;

type Deserializer = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserializer,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserializer) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[cfg(feature = "yaml")]
    #[must_use]
    pub fn yaml(path: PathBuf) -> Self {
        Self::new(path, "yaml", |content| {
            serde_yml::from_str::<Config>(content).map_err(Into::into)
        })
    }

    #[cfg(feature = "json")]
    #[must_use]
    pub fn json(path: PathBuf) -> Self {
        Self::new(path, "json", |content| {
            serde_json::from_str::<Config>(content).map_err(Into::into)
        })
    }

    #[cfg(feature = "toml")]
    #[must_use]
    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, "toml", |content| {
            toml::from_str::<Config>(content).map_err(Into::into)
        })
    }

    /// Pick the deserializer from the file extension.
    pub fn for_path(path: &Path) -> Result<Self, RoutemuxError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::yaml(path.to_path_buf())),

            #[cfg(feature = "json")]
            "json" => Ok(Self::json(path.to_path_buf())),

            #[cfg(feature = "toml")]
            "toml" => Ok(Self::toml(path.to_path_buf())),

            other => Err(RoutemuxError::UnsupportedFormat(other.to_string())),
        }
    }

    async fn read_content(&self) -> Result<String, RoutemuxError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RoutemuxError::ConfigFileNotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => Err(RoutemuxError::Io(e)),
        }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), RoutemuxError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|source| RoutemuxError::ConfigParse {
            path: self.path.display().to_string(),
            source,
        })?;

        validate(&config).map_err(|errors| RoutemuxError::ConfigValidation { errors })?;

        let version = ConfigVersion::Hash(sha256_hex(content.as_bytes()));
        tracing::debug!(
            path = %self.path.display(),
            version = version.short(),
            servers = config.servers.len(),
            "config file loaded"
        );
        Ok((config, version))
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, RoutemuxError> {
        let content = self.read_content().await?;
        Ok(*current != ConfigVersion::Hash(sha256_hex(content.as_bytes())))
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    fn json_source(path: PathBuf) -> FileSource {
        FileSource::json(path)
    }

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "routemux-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn extension_selects_format() {
        let source = FileSource::for_path(Path::new("routes.json")).unwrap();
        assert_eq!(source.name(), "json");
        assert!(matches!(
            FileSource::for_path(Path::new("routes.ini")),
            Err(RoutemuxError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_reported_by_path() {
        let source = json_source(PathBuf::from("/nonexistent/routemux.json"));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, RoutemuxError::ConfigFileNotFound { .. }));
    }

    #[tokio::test]
    async fn detects_content_change() {
        let path = scratch_file(
            "change",
            r#"{"listen_port": 8000, "default_port": 3000}"#,
        );
        let source = json_source(path.clone());
        let (_, version) = source.load().await.unwrap();
        assert!(!source.has_changed(&version).await.unwrap());

        std::fs::write(&path, r#"{"listen_port": 8000, "default_port": 3001}"#).unwrap();
        assert!(source.has_changed(&version).await.unwrap());

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_on_load() {
        let path = scratch_file("invalid", r#"{"listen_port": 0, "default_port": 3000}"#);
        let err = json_source(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, RoutemuxError::ConfigValidation { .. }));
        let _ = std::fs::remove_file(path);
    }
}
