use super::{EndpointClient, EndpointError};
use async_trait::async_trait;

/// Endpoint client over HTTP; paths are full urls relative to the endpoint
/// root.
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> HttpClient {
        HttpClient {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpClient {
    fn default() -> HttpClient {
        HttpClient::new()
    }
}

#[async_trait]
impl EndpointClient for HttpClient {
    async fn get(&self, path: &str) -> Result<Vec<u8>, EndpointError> {
        let resp = self
            .client
            .get(path)
            .send()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        if status == 404 {
            return Err(EndpointError::NotFound(path.to_string()));
        }
        if !(200..300).contains(&status) {
            return Err(EndpointError::Status(status));
        }
        Ok(resp
            .bytes()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?
            .to_vec())
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<(), EndpointError> {
        let resp = self
            .client
            .put(path)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(EndpointError::Status(status));
        }
        Ok(())
    }
}
