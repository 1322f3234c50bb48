use crate::{ClientError, ErrorResponse, IpLookup, RequestOptions, Result};
use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{
    future::BoxFuture,
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use tokio::io::AsyncBufRead;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument, warn};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://v3api.synthient.com/api/v3";
pub const DEFAULT_FEEDS_BASE: &str = "https://feeds.synthient.com/v3";

// Error bodies past this size are not worth parsing for a message.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Raw response body as produced by a transport.
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// The transport every request goes through.
///
/// `reqwest::Client` implements it; tests plug in their own.
pub trait HttpClient: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>>;
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|source| ClientError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self {
            method: Method::GET,
            url: parsed,
            headers: HeaderMap::new(),
            body: None,
        })
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub body: BodyStream,
}

impl HttpResponse {
    /// A response whose whole body is already in memory.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl HttpClient for reqwest::Client {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        Box::pin(async move {
            let url = request.url.to_string();
            let mut builder = self
                .request(request.method, request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|err| ClientError::Transport {
                    url,
                    source: Box::new(err),
                })?;

            let status = response.status().as_u16();
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other))
                .boxed();
            Ok(HttpResponse { status, body })
        })
    }
}

/// A response body being read incrementally.
///
/// Every chunk read honours the cancellation token and deadline of the call
/// that produced it. Dropping the stream releases the connection.
pub struct ByteStream {
    url: String,
    inner: BoxStream<'static, Result<Bytes>>,
}

impl ByteStream {
    pub(crate) fn new(url: String, body: BodyStream, options: RequestOptions) -> Self {
        let stream_url = url.clone();
        let inner = stream::unfold(Some((body, options)), move |state| {
            let url = stream_url.clone();
            async move {
                let Some((mut body, options)) = state else {
                    return None;
                };
                match options.run(&url, body.next()).await {
                    Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some((body, options)))),
                    Ok(Some(Err(source))) => Some((Err(ClientError::Stream { url, source }), None)),
                    Ok(None) => None,
                    Err(err) => Some((Err(err), None)),
                }
            }
        })
        .boxed();
        Self { url, inner }
    }

    /// The URL the body is being read from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reads the rest of the body into memory.
    pub async fn bytes(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }

    /// Adapts the stream for `tokio::io` consumers such as `tokio::io::copy`
    /// or a line reader.
    pub fn into_async_read(self) -> impl AsyncBufRead + Send + Unpin {
        StreamReader::new(self.map(|chunk| chunk.map_err(std::io::Error::other)))
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn HttpClient>,
    token: String,
    api_base: String,
    feeds_base: String,
}

impl Client {
    /// Creates a client with its own pooled `reqwest::Client` and the default
    /// base URLs. The token is not checked until a request is made.
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            transport: Arc::new(reqwest::Client::new()),
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            feeds_base: DEFAULT_FEEDS_BASE.to_string(),
        }
    }

    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = token.into();
        self
    }

    /// Replaces the transport, e.g. with a `reqwest::Client` carrying custom
    /// timeouts or a proxy.
    pub fn with_transport<T: HttpClient + 'static>(mut self, transport: T) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn with_api_base<S: Into<String>>(mut self, base_url: S) -> Self {
        self.api_base = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_feeds_base<S: Into<String>>(mut self, base_url: S) -> Self {
        self.feeds_base = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn feeds_base(&self) -> &str {
        &self.feeds_base
    }

    /// Looks up enrichment details for a single IPv4/IPv6 address.
    ///
    /// Calls `GET {api_base}/lookup/ip/{ip}`. The address is not validated
    /// locally; the API answers malformed input with a 400. The address is
    /// sent as a single path segment, so IPv6 colons stay literal.
    #[instrument(skip_all, fields(ip = %ip))]
    pub async fn get_ip(&self, ip: &str, options: Option<&RequestOptions>) -> Result<IpLookup> {
        let mut request = HttpRequest::get(&format!("{}/lookup/ip", self.api_base))?;
        request
            .url
            .path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl {
                url: self.api_base.clone(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .push(ip);
        self.request_json::<IpLookup>(request, 200, options).await
    }

    /// Sends an authenticated request and returns the body as a stream when
    /// the response status equals `expected_status`.
    ///
    /// 400, 401, 402 and 500 always map to their dedicated errors, even when
    /// one of them is the expected status.
    pub async fn request(
        &self,
        mut request: HttpRequest,
        expected_status: u16,
        options: Option<&RequestOptions>,
    ) -> Result<ByteStream> {
        if self.token.trim().is_empty() {
            return Err(ClientError::Unauthenticated);
        }
        let mut auth = HeaderValue::from_str(&self.token).map_err(|_| ClientError::InvalidToken)?;
        auth.set_sensitive(true);
        request.headers.insert(AUTHORIZATION, auth);

        let options = options.cloned().unwrap_or_default();
        let url = request.url.to_string();

        debug!(method = %request.method, url = %url, "sending request");
        let response = options.run(&url, self.transport.send(request)).await??;
        debug!(status = response.status, url = %url, "received response");

        let status = response.status;
        match status {
            400 | 401 | 402 | 500 => {}
            _ if status == expected_status => {
                return Ok(ByteStream::new(url, response.body, options));
            }
            _ => {}
        }

        let message = read_vendor_message(&url, response.body, &options).await;
        let err = ClientError::from_status(url, status, expected_status, message);
        warn!(status, expected_status, error = %err, "request failed");
        Err(err)
    }

    /// Like [`Client::request`], but reads the whole body and decodes it as
    /// JSON. The body is always consumed and released here.
    pub async fn request_json<T>(
        &self,
        request: HttpRequest,
        expected_status: u16,
        options: Option<&RequestOptions>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.request(request, expected_status, options).await?;
        let url = body.url().to_string();
        let raw = body.bytes().await?;
        serde_json::from_slice::<T>(&raw).map_err(|source| ClientError::Decode { url, source })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("feeds_base", &self.feeds_base)
            .finish_non_exhaustive()
    }
}

/// Best effort: pulls `{"error": "..."}` out of a failed response. Any
/// problem reading or parsing the body yields `None`.
async fn read_vendor_message(
    url: &str,
    body: BodyStream,
    options: &RequestOptions,
) -> Option<String> {
    let mut body = ByteStream::new(url.to_string(), body, options.clone());
    let mut raw = Vec::new();
    while let Some(chunk) = body.next().await {
        raw.extend_from_slice(&chunk.ok()?);
        if raw.len() > MAX_ERROR_BODY {
            return None;
        }
    }
    serde_json::from_slice::<ErrorResponse>(&raw)
        .ok()
        .map(|body| body.error)
        .filter(|message| !message.trim().is_empty())
}
