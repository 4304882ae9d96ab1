//! Primitive HTTP verbs.
//!
//! The verbs only assemble method, URL, query or body, and the call's
//! cancellation signal. Interpreting failures is the router's job.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dispatcher::RequestContext;
use crate::errors::RequestError;

/// Cookie-bearing HTTP client rooted at a base URL.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Build a client with a cookie store and the given timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::NoResponse(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET path`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<T, RequestError> {
        self.execute(ctx, self.request(Method::GET, path)).await
    }

    /// `GET path?query`.
    pub async fn get_with_query<T, Q>(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: &Q,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(ctx, self.request(Method::GET, path).query(query))
            .await
    }

    /// `POST path` with a JSON body.
    pub async fn post<T, B>(&self, ctx: &RequestContext, path: &str, body: &B) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ctx, self.request(Method::POST, path).json(body))
            .await
    }

    /// `PUT path` with a JSON body.
    pub async fn put<T, B>(&self, ctx: &RequestContext, path: &str, body: &B) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(ctx, self.request(Method::PUT, path).json(body))
            .await
    }

    /// `DELETE path`.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<T, RequestError> {
        self.execute(ctx, self.request(Method::DELETE, path)).await
    }

    /// `DELETE path?query`.
    pub async fn delete_with_query<T, Q>(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: &Q,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(ctx, self.request(Method::DELETE, path).query(query))
            .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    #[instrument(skip_all, fields(epoch = ctx.epoch()))]
    async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        builder: RequestBuilder,
    ) -> Result<T, RequestError> {
        ctx.guard(async move {
            let response = builder.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            debug!(status = status.as_u16(), len = bytes.len(), "response received");

            if !status.is_success() {
                let body = serde_json::from_slice::<Value>(&bytes).ok();
                return Err(RequestError::from_response(status.as_u16(), body));
            }
            let body = if bytes.is_empty() { b"null".as_slice() } else { &bytes[..] };
            serde_json::from_slice(body)
                .map_err(|e| RequestError::NoResponse(format!("invalid response body: {e}")))
        })
        .await
    }
}
