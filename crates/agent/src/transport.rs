// HTTP transport for the control API

use std::time::Duration;

use async_trait::async_trait;
use leadline_core::{ControlError, ControlTransport, TransportError};
use url::Url;

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ControlError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("leadline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ControlError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl ControlTransport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<String, TransportError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.map_error(e))
    }
}
