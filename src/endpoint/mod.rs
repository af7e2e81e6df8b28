pub mod memory;

#[cfg(feature = "fs")]
pub mod file;

#[cfg(feature = "reqwest")]
pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Attempts per blob before a transfer is declared unrecoverable.
const MAX_ATTEMPTS: usize = 20;

#[async_trait]
pub trait EndpointClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>, EndpointError>;

    async fn put(&self, path: &str, data: &[u8]) -> Result<(), EndpointError>;
}

#[async_trait]
impl<C: EndpointClient> EndpointClient for Arc<C> {
    async fn get(&self, path: &str) -> Result<Vec<u8>, EndpointError> {
        (**self).get(path).await
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<(), EndpointError> {
        (**self).put(path, data).await
    }
}

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status code: {0}")]
    Status(u16),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: giving up after {attempts} attempts: {source}")]
    Exhausted {
        path: String,
        attempts: usize,
        source: Box<EndpointError>,
    },

    #[error("{0}")]
    Other(String),
}

impl EndpointError {
    /// Missing objects and exhaustion are definitive; everything else is
    /// worth another attempt.
    fn is_transient(&self) -> bool {
        !matches!(
            self,
            EndpointError::NotFound(_) | EndpointError::Exhausted { .. }
        )
    }
}

/// A byte store rooted at a path prefix. `ensure_put` / `ensure_get` retry
/// transient failures with linear backoff; repeated PUTs of the same bytes
/// to the same path are assumed idempotent.
pub struct Endpoint<C: EndpointClient> {
    root: String,
    client: C,
}

impl<C: EndpointClient> Endpoint<C> {
    pub fn new(root: &str, client: C) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn full_path(&self, sub: &str) -> String {
        if self.root.is_empty() {
            sub.to_string()
        } else {
            format!("{}/{}", self.root, sub)
        }
    }

    pub async fn get(&self, sub: &str) -> Result<Vec<u8>, EndpointError> {
        self.client.get(&self.full_path(sub)).await
    }

    pub async fn put(&self, sub: &str, data: &[u8]) -> Result<(), EndpointError> {
        self.client.put(&self.full_path(sub), data).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, sub: &str) -> Result<T, EndpointError> {
        let bytes = self.get(sub).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET with retry: after failed attempt `k`, sleep `k` seconds and try
    /// again, up to [`MAX_ATTEMPTS`].
    pub async fn ensure_get(&self, sub: &str) -> Result<Vec<u8>, EndpointError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get(sub).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        path = %self.full_path(sub),
                        attempt,
                        error = %err,
                        "GET failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(err @ EndpointError::NotFound(_)) => return Err(err),
                Err(err) => {
                    return Err(EndpointError::Exhausted {
                        path: self.full_path(sub),
                        attempts: attempt,
                        source: Box::new(err),
                    })
                }
            }
        }
    }

    /// PUT with the same retry discipline as [`ensure_get`](Self::ensure_get).
    pub async fn ensure_put(&self, sub: &str, data: &[u8]) -> Result<(), EndpointError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.put(sub, data).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        path = %self.full_path(sub),
                        attempt,
                        error = %err,
                        "PUT failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                Err(err) => {
                    return Err(EndpointError::Exhausted {
                        path: self.full_path(sub),
                        attempts: attempt,
                        source: Box::new(err),
                    })
                }
            }
        }
    }
}
