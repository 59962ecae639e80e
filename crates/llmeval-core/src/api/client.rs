//! HTTP client for the evaluation backend REST API.
//!
//! This module provides the `ApiClient` transport: JSON verbs whose bodies
//! are validated through `Envelope`, multipart uploads for the import
//! endpoints and raw downloads for exports. Resource-specific calls live in
//! `endpoints`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, multipart, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{ListParams, UploadFile};

use super::{ApiError, Envelope};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Name of the multipart part carrying the uploaded file.
const UPLOAD_PART_NAME: &str = "file";

/// Query string and JSON body of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn with_params(params: &ListParams) -> Self {
        Self {
            query: params.as_query().to_vec(),
            body: None,
        }
    }

    pub fn with_body(body: Value) -> Self {
        Self {
            query: Vec::new(),
            body: Some(body),
        }
    }
}

/// Status and decoded JSON body of a successful response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub data: Value,
}

impl RawResponse {
    pub fn envelope(self) -> Envelope<Value> {
        Envelope::from_body(self.data)
    }
}

/// API client for the evaluation backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()).into());
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, percent-encoding each one.
    pub fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send the request built by `build`, rebuilding it for each rate-limit retry.
    async fn send<F>(&self, url: &Url, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn read_json(response: Response, url: &Url) -> Result<RawResponse> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        let data = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::InvalidResponse(format!("Body from {} is not JSON: {}", url, e))
            })?
        };

        debug!(url = %url, status = %status, "Response received");
        Ok(RawResponse { status, data })
    }

    /// Send a JSON request and return the status with the undecoded body.
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        options: &RequestOptions,
    ) -> Result<RawResponse> {
        let url = self.url_for(segments)?;
        debug!(method = %method, url = %url, "Sending request");

        let response = self
            .send(&url, || {
                let mut builder = self
                    .client
                    .request(method.clone(), url.clone())
                    .header(header::ACCEPT, "application/json");
                if !options.query.is_empty() {
                    builder = builder.query(&options.query);
                }
                if let Some(ref body) = options.body {
                    builder = builder.json(body);
                }
                builder
            })
            .await?;

        Self::read_json(response, &url).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        options: &RequestOptions,
    ) -> Result<T> {
        let raw = self.request(method, segments, options).await?;
        let data = raw.envelope().decode::<T>()?.into_result()?;
        Ok(data)
    }

    fn body_options<B: Serialize + ?Sized>(body: &B) -> Result<RequestOptions> {
        let body = serde_json::to_value(body).context("Failed to encode request body")?;
        Ok(RequestOptions::with_body(body))
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str], params: &ListParams) -> Result<T> {
        self.call(Method::GET, segments, &RequestOptions::with_params(params))
            .await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.call(Method::POST, segments, &Self::body_options(body)?)
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.call(Method::PUT, segments, &Self::body_options(body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.call(Method::PATCH, segments, &Self::body_options(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.call(Method::DELETE, segments, &RequestOptions::default())
            .await
    }

    /// POST a multipart body with the file under the `file` part.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &ListParams,
        file: &UploadFile,
    ) -> Result<T> {
        let url = self.url_for(segments)?;
        debug!(url = %url, file = %file.file_name, bytes = file.bytes.len(), "Uploading file");

        let response = self
            .send(&url, || {
                let part = multipart::Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
                let form = multipart::Form::new().part(UPLOAD_PART_NAME, part);
                self.client
                    .post(url.clone())
                    .header(header::ACCEPT, "application/json")
                    .query(params.as_query())
                    .multipart(form)
            })
            .await?;

        let raw = Self::read_json(response, &url).await?;
        let data = raw.envelope().decode::<T>()?.into_result()?;
        Ok(data)
    }

    /// GET a binary payload (exports).
    pub async fn download(&self, segments: &[&str], params: &ListParams) -> Result<Vec<u8>> {
        let url = self.url_for(segments)?;
        debug!(url = %url, "Downloading");

        let response = self
            .send(&url, || {
                self.client
                    .get(url.clone())
                    .header(header::ACCEPT, "application/json")
                    .query(params.as_query())
            })
            .await?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read download body from {}", url))?;
        Ok(bytes.to_vec())
    }
}
