//! Request client implementation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, FailureCause, RequestFailure, Result};
use crate::identity::IdentityProvider;

use super::builder::{ApiClientBuilder, header_map, normalize_base_url};
use super::options::RequestOptions;

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the session identifier.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("session-id");

/// Header carrying the server authentication token.
pub const SERVER_TOKEN_HEADER: HeaderName = HeaderName::from_static("server-token");

/// Segment between the base URL and every request path.
const API_PREFIX: &str = "api";

const JSON_CONTENT_TYPE: &str = "application/json";

// ============================================================================
// Payload
// ============================================================================

/// Successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    /// JSON body decoded as `T`.
    Json(T),
    /// Non-JSON body, verbatim. Only produced by POST.
    Text(String),
    /// No usable body.
    Empty,
}

impl<T> Payload<T> {
    /// Returns the decoded JSON value, if any.
    #[inline]
    pub fn into_json(self) -> Option<T> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the raw text, if any.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns `true` for [`Payload::Empty`].
    #[inline]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

// ============================================================================
// RequestDescriptor
// ============================================================================

/// A fully resolved request, ready to dispatch.
#[derive(Clone)]
pub struct RequestDescriptor {
    /// GET or POST.
    pub method: Method,
    /// `base_url + "api" + path`.
    pub url: Url,
    /// Identity headers merged with defaults and caller overrides.
    pub headers: HeaderMap,
    /// JSON body, POST only.
    pub body: Option<Value>,
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body.is_some())
            .finish()
    }
}

// ============================================================================
// ApiClient
// ============================================================================

/// One-shot authenticated requests against the notebook backend.
///
/// Stateless between calls: no retries, batching or deduplication.
///
/// # Example
///
/// ```no_run
/// use notebook_link::client::{ApiClient, Payload, RequestOptions};
/// use serde_json::{Value, json};
///
/// # async fn example() -> notebook_link::Result<()> {
/// let client = ApiClient::builder().base_url("http://127.0.0.1:2718/").build()?;
///
/// let payload: Payload<Value> = client
///     .post("/kernel/run", &json!({ "cellId": "abc" }), &RequestOptions::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    identity: Arc<IdentityProvider>,
    default_headers: HeaderMap,
}

impl ApiClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        identity: Arc<IdentityProvider>,
        default_headers: HeaderMap,
    ) -> Self {
        Self {
            http,
            base_url,
            identity,
            default_headers,
        }
    }

    /// Returns the origin paths are resolved against.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the identity attached to every request.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    /// Resolves URL and headers for a call without sending it.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] / [`Error::Config`] for a bad base URL override
    /// - [`Error::InvalidHeader`] for a malformed caller header
    pub fn describe(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: &RequestOptions,
    ) -> Result<RequestDescriptor> {
        let base_url = match options.base_url.as_deref() {
            Some(base_url) => normalize_base_url(base_url)?,
            None => self.base_url.clone(),
        };
        let url = Url::parse(&format!("{base_url}{API_PREFIX}{path}"))?;

        let mut token = HeaderValue::try_from(self.identity.server_token().as_str())?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(
            SESSION_ID_HEADER,
            HeaderValue::try_from(self.identity.session_id().to_string())?,
        );
        headers.insert(SERVER_TOKEN_HEADER, token);
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        for (name, value) in &self.default_headers {
            headers.insert(name.clone(), value.clone());
        }
        headers.extend(header_map(&options.headers)?);

        Ok(RequestDescriptor {
            method,
            url,
            headers,
            body,
        })
    }

    /// Issues a GET.
    ///
    /// A JSON response decodes into `T`; anything else yields
    /// [`Payload::Empty`] without reading the body.
    ///
    /// # Errors
    ///
    /// - [`Error::Request`] on a non-2xx status
    /// - [`Error::Http`] if the request never completed
    /// - [`Error::Json`] if a JSON body does not match `T`
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<Payload<T>> {
        let descriptor = self.describe(Method::GET, path, None, options)?;
        let (method, url) = (descriptor.method.clone(), descriptor.url.clone());

        let outcome: Result<Payload<T>> = async {
            let response = self.execute(descriptor).await?;
            if !is_json(&response) {
                return Ok(Payload::Empty);
            }
            decode_json(response).await
        }
        .await;
        logged(&method, &url, outcome)
    }

    /// Issues a POST with `body` serialized as JSON.
    ///
    /// A JSON response decodes into `T`; any other response is returned as
    /// [`Payload::Text`].
    ///
    /// # Errors
    ///
    /// - [`Error::Request`] on a non-2xx status
    /// - [`Error::Http`] if the request never completed
    /// - [`Error::Json`] if `body` fails to serialize or the response does
    ///   not match `T`
    pub async fn post<B, T>(&self, path: &str, body: &B, options: &RequestOptions) -> Result<Payload<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let descriptor = self.describe(Method::POST, path, Some(body), options)?;
        let (method, url) = (descriptor.method.clone(), descriptor.url.clone());

        let outcome: Result<Payload<T>> = async {
            let response = self.execute(descriptor).await?;
            if is_json(&response) {
                return decode_json(response).await;
            }
            Ok(Payload::Text(response.text().await?))
        }
        .await;
        logged(&method, &url, outcome)
    }

    /// Sends `descriptor`, turning non-2xx statuses into [`Error::Request`].
    async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response> {
        trace!(?descriptor, "Dispatching request");

        let RequestDescriptor {
            method,
            url,
            headers,
            body,
        } = descriptor;

        let mut request = self.http.request(method.clone(), url.clone()).headers(headers);
        if let Some(body) = &body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await.map_err(Error::Http)?;

        let status = response.status();
        if status.is_success() {
            debug!(%method, url = %url, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let json = is_json(&response);
        let text = response.text().await?;
        let cause = if json {
            serde_json::from_str(&text).map_or_else(|_| FailureCause::Text(text), FailureCause::Json)
        } else {
            FailureCause::Text(text)
        };

        let failure = RequestFailure::new(url.as_str(), status, cause);
        warn!(
            %method,
            url = %failure.url,
            status = status.as_u16(),
            status_text = %failure.status_text,
            "Request rejected by server"
        );
        Err(failure.into())
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Logs a failed exchange with its URL and hands the result back unchanged.
///
/// Server rejections were already logged by `execute`.
fn logged<T>(method: &Method, url: &Url, outcome: Result<T>) -> Result<T> {
    outcome.inspect_err(|e| {
        if !e.is_request_failure() {
            error!(%method, url = %url, error = %e, "Request failed");
        }
    })
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case(JSON_CONTENT_TYPE) || mime.ends_with("+json")
        })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<Payload<T>> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Payload::Empty);
    }
    Ok(Payload::Json(serde_json::from_slice(&bytes)?))
}

// ============================================================================
// Tests
// ============================================================================
