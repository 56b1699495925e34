// Resource Fetcher - Album Download Engine
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP transport
//!
//! Adapters and the download manager only see the [`Transport`] trait: one
//! GET with a timeout, returning status, the headers the naming pipeline
//! needs, and a streaming body. [`ReqwestTransport`] is the production
//! implementation.

use crate::error::{FetchError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Client;
use std::fmt;
use std::time::Duration;

/// Browser-like user agent; some catalog hosts reject library defaults
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming response body
pub type BodyStream = BoxStream<'static, std::result::Result<Bytes, FetchError>>;

/// Response headers used by the filename pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    /// Raw Content-Disposition bytes; servers send non-ASCII names unencoded
    pub content_disposition: Option<Vec<u8>>,

    pub content_type: Option<String>,

    /// Declared body length, if any
    pub content_length: Option<u64>,
}

/// One HTTP response with a not-yet-consumed body
pub struct HttpResponse {
    pub status: u16,
    pub headers: ResponseHeaders,
    pub body: BodyStream,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into memory (catalog pages)
    pub async fn into_bytes(mut self) -> std::result::Result<Vec<u8>, FetchError> {
        let mut data = Vec::new();
        while let Some(chunk) = self.body.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Capability to perform a single HTTP GET
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a GET request; `timeout` bounds the whole exchange
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<HttpResponse, FetchError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let header_map = response.headers();
        let headers = ResponseHeaders {
            content_disposition: header_map
                .get(CONTENT_DISPOSITION)
                .map(|v| v.as_bytes().to_vec()),
            content_type: header_map
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            content_length: response.content_length(),
        };

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| FetchError::from_reqwest(&e)))
            .boxed();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn response(status: u16, chunks: Vec<&'static [u8]>) -> HttpResponse {
        HttpResponse {
            status,
            headers: ResponseHeaders::default(),
            body: stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c)))).boxed(),
        }
    }

    #[test]
    fn test_success_range() {
        assert!(response(200, vec![]).is_success());
        assert!(response(206, vec![]).is_success());
        assert!(!response(301, vec![]).is_success());
        assert!(!response(404, vec![]).is_success());
    }

    #[tokio::test]
    async fn test_into_bytes_concatenates_chunks() {
        let body = response(200, vec![b"<html>", b"</html>"]).into_bytes().await.unwrap();
        assert_eq!(body, b"<html></html>");
    }

    #[test]
    fn test_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }
}
