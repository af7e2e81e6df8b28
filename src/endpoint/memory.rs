use super::{EndpointClient, EndpointError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Endpoint client backed by a map. Useful for tests and for staging small
/// builds entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryClient {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryClient {
    pub fn new() -> MemoryClient {
        MemoryClient::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .lock()
            .expect("object map poisoned")
            .contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().expect("object map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("object map poisoned")
            .get(path)
            .cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .lock()
            .expect("object map poisoned")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl EndpointClient for MemoryClient {
    async fn get(&self, path: &str) -> Result<Vec<u8>, EndpointError> {
        self.object(path)
            .ok_or_else(|| EndpointError::NotFound(path.to_string()))
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<(), EndpointError> {
        self.objects
            .lock()
            .expect("object map poisoned")
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let client = MemoryClient::new();
        client.put("a/b", &[1, 2, 3]).await.unwrap();
        assert_eq!(client.get("a/b").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(client.paths(), vec!["a/b".to_string()]);
    }

    #[tokio::test]
    async fn get_of_missing_path_is_not_found() {
        let client = MemoryClient::new();
        assert!(matches!(
            client.get("absent").await,
            Err(EndpointError::NotFound(_))
        ));
    }
}
