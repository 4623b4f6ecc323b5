use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};

use crate::error::{GeminiError, Result};

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Minimal HTTP boundary used by the client. Implementations send no request body,
/// do not retry, and own any timeout policy.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct ProxyOptions {
    pub http: Option<String>,
    pub https: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>, proxy: ProxyOptions) -> Result<Self> {
        let mut builder = Client::builder().user_agent("gemini-trader/0.1");

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(ref http_proxy) = proxy.http {
            tracing::debug!("configuring HTTP proxy {}", http_proxy);
            builder = builder.proxy(reqwest::Proxy::http(http_proxy)?);
        }

        if let Some(ref https_proxy) = proxy.https {
            tracing::debug!("configuring HTTPS proxy {}", https_proxy);
            builder = builder.proxy(reqwest::Proxy::https(https_proxy)?);
        }

        let http = builder.build().map_err(GeminiError::from)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let response = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
