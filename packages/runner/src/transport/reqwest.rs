use std::time::Duration;

use async_trait::async_trait;
use loadgen_profile::{Method, Request};
use url::Url;

use crate::transport::{Error, StatusCode, Transport};

/// [`Transport`] backed by a pooled `reqwest::Client`.
///
/// Request paths are appended to the host as given, so a host of
/// `http://svc:8080/api` sends metrics to `http://svc:8080/api/metrics`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    host: String,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// * If `host` is not an absolute URL
    /// * If the `reqwest::Client` fails to build
    pub fn new(host: &str, timeout: Duration) -> Result<Self, Error> {
        Url::parse(host)?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    ///
    /// * If the joined URL is invalid
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}{path}", self.host))?)
    }
}

const fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<StatusCode, Error> {
        let mut builder = self
            .client
            .request(method(request.method), self.url(request.path)?);

        if let Some(sample) = &request.body {
            builder = builder.json(sample);
        }

        let response = builder.send().await?;
        let status = StatusCode::from_u16(response.status().as_u16())?;

        // Drain the body so the connection goes back to the pool
        response.bytes().await?;

        Ok(status)
    }
}
