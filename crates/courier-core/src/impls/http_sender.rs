//! HTTP sender backed by reqwest.
//!
//! Relative request URLs are resolved against the configured base URL, so
//! persisted operations stay valid if the API host changes between runs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::domain::RequestTarget;
use crate::ports::Sender;
use crate::transport::{HttpResponse, TransportError};

pub struct ReqwestSender {
    client: Client,
    base_url: String,
}

impl ReqwestSender {
    /// Create a sender. An empty `base_url` means every request must carry an absolute URL.
    ///
    /// No overall client timeout: the retry transport enforces the per-attempt deadline.
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, url: &str) -> Result<String, TransportError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        if self.base_url.is_empty() {
            return Err(TransportError::InvalidRequest(format!(
                "relative url {url} with no base url configured"
            )));
        }
        if url.starts_with('/') {
            Ok(format!("{}{}", self.base_url, url))
        } else {
            Ok(format!("{}/{}", self.base_url, url))
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        // connect, timeout, body, decode: no usable response arrived
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Sender for ReqwestSender {
    async fn send(&self, request: &RequestTarget) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method().as_bytes()).map_err(|_| {
            TransportError::InvalidRequest(format!("invalid method {}", request.method()))
        })?;
        let url = self.resolve(&request.url)?;

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
