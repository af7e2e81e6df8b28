use super::{EndpointClient, EndpointError};
use async_trait::async_trait;
use std::path::Path;

/// Endpoint client over the local filesystem. Accepts `file://` urls or
/// plain paths; PUT creates missing parent directories.
#[derive(Clone, Debug, Default)]
pub struct FileClient;

impl FileClient {
    pub fn new() -> FileClient {
        FileClient
    }

    fn local_path(path: &str) -> &str {
        path.strip_prefix("file://").unwrap_or(path)
    }
}

#[async_trait]
impl EndpointClient for FileClient {
    async fn get(&self, path: &str) -> Result<Vec<u8>, EndpointError> {
        let path = Self::local_path(path);
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(EndpointError::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<(), EndpointError> {
        let path = Self::local_path(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::Endpoint;
    use super::*;

    #[tokio::test]
    async fn writes_and_reads_under_a_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        let endpoint = Endpoint::new(&root, FileClient::new());

        endpoint.put("chunks/42", b"blob").await.unwrap();
        assert_eq!(endpoint.get("chunks/42").await.unwrap(), b"blob");
        assert!(dir.path().join("chunks/42").exists());
    }

    #[tokio::test]
    async fn file_scheme_urls_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let root = format!("file://{}", dir.path().to_str().unwrap());
        let endpoint = Endpoint::new(&root, FileClient::new());

        endpoint.put("9", &[7]).await.unwrap();
        assert_eq!(endpoint.get("9").await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn missing_files_surface_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        let endpoint = Endpoint::new(&root, FileClient::new());
        assert!(matches!(
            endpoint.get("absent").await,
            Err(EndpointError::NotFound(_))
        ));
    }
}
