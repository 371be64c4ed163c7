//! A [`ChatBackend`] implementation for the HTTP conversation
//! service.

#[macro_use]
extern crate tracing;

mod config;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use haven_remote::{
    BackendError, ChatBackend, ChatReply, ChatRequest, ConversationSummary,
    ErrorKind, HistoryMessage,
};
use reqwest::{Client, Response};
use serde::Deserialize;

pub use config::{HttpConfig, HttpConfigBuilder};

/// Error type for [`HttpBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Transport errors, bad statuses and undecodable bodies all
        // leave the caller equally unable to proceed.
        Self {
            message: format!("{err}"),
            kind: ErrorKind::Unavailable,
        }
    }
}

/// The service's health report.
#[derive(Clone, Debug, Deserialize)]
pub struct Health {
    /// Health status string, `"ok"` when the service is up.
    pub status: String,
    /// Server-side timestamp of the check.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// HTTP conversation service backend.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<HttpConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    pub fn new(config: HttpConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            client: builder.build().expect("failed to construct HTTP client"),
            config: Arc::new(config),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Pings the service's health endpoint.
    pub async fn health(&self) -> Result<Health, Error> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .and_then(Response::error_for_status)?;
        Ok(resp.json().await?)
    }
}

impl ChatBackend for HttpBackend {
    type Error = Error;

    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Error>> + Send + 'static
    {
        let resp_fut = self.client.get(self.url("/conversations")).send();
        async move {
            let resp =
                resp_fut.await.and_then(Response::error_for_status)?;
            let summaries: Vec<ConversationSummary> = resp.json().await?;
            trace!("listed {} conversations", summaries.len());
            Ok(summaries)
        }
    }

    fn fetch_history(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Error>> + Send + 'static
    {
        let resp_fut = self
            .client
            .get(self.url(&format!("/history/{session_id}")))
            .send();
        async move {
            let resp =
                resp_fut.await.and_then(Response::error_for_status)?;
            Ok(resp.json().await?)
        }
    }

    fn send_chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, Error>> + Send + 'static {
        let resp_fut =
            self.client.post(self.url("/chat")).json(req).send();
        async move {
            let resp =
                resp_fut.await.and_then(Response::error_for_status)?;
            Ok(resp.json().await?)
        }
    }

    fn reset(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        let resp_fut = self
            .client
            .post(self.url(&format!("/reset/{session_id}")))
            .send();
        async move {
            // The response body carries no information we need.
            resp_fut.await.and_then(Response::error_for_status)?;
            Ok(())
        }
    }
}
