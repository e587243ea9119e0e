//! Client for the proxy's in-process dynamic configuration surface.

use std::collections::BTreeMap;
use std::time::Duration;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::schema::ProxyConfig;
use crate::model::{Backend, Configuration};

/// Errors raised by a single dynamic configuration attempt.
#[derive(Debug, thiserror::Error)]
pub enum DynamicError {
    #[error("invalid control endpoint '{0}'")]
    Endpoint(String),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} rejected the update with status {status}")]
    Rejected { url: String, status: u16 },

    #[error("{0}")]
    Other(String),
}

/// In-process control surface of the running proxy.
///
/// One call is one attempt: the surface either accepts the whole update or
/// rejects it.
#[async_trait]
pub trait DynamicConfigurator: Send + Sync {
    async fn configure(&self, new: &Configuration, old: &Configuration) -> Result<(), DynamicError>;
}

/// Certificates keyed by hostname, as posted to `/configuration/servers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServersPayload {
    pub servers: BTreeMap<String, String>,
    pub certificates: BTreeMap<String, String>,
}

impl ServersPayload {
    pub fn from_config(config: &Configuration) -> Self {
        let mut payload = Self::default();
        for server in &config.servers {
            if let Some(cert) = &server.tls {
                let id = cert.identity();
                payload.servers.insert(server.hostname.clone(), id.clone());
                payload.certificates.insert(id, cert.pem.clone());
            }
        }
        payload
    }
}

/// Posts routing updates to a local HTTP control endpoint.
#[derive(Debug, Clone)]
pub struct HttpConfigurator {
    client: reqwest::Client,
    base: url::Url,
}

impl HttpConfigurator {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, DynamicError> {
        let base = url::Url::parse(endpoint).map_err(|_| DynamicError::Endpoint(endpoint.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| DynamicError::Other(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, DynamicError> {
        Self::new(&config.control_endpoint, Duration::from_secs(config.control_timeout_secs))
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), DynamicError> {
        let url = self
            .base
            .join(path)
            .map_err(|_| DynamicError::Endpoint(format!("{}{}", self.base, path)))?;
        let url_str = url.to_string();

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| DynamicError::Request {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DynamicError::Rejected {
                url: url_str,
                status: status.as_u16(),
            });
        }
        tracing::debug!(url = %url_str, "Dynamic update accepted");
        Ok(())
    }
}

#[async_trait]
impl DynamicConfigurator for HttpConfigurator {
    async fn configure(&self, new: &Configuration, old: &Configuration) -> Result<(), DynamicError> {
        if new.backends != old.backends {
            let backends: &[Backend] = &new.backends;
            self.post("/configuration/backends", backends).await?;
        }
        if new.servers != old.servers {
            self.post("/configuration/servers", &ServersPayload::from_config(new)).await?;
        }
        Ok(())
    }
}
