//! Tests plugging a custom transport into the client.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use futures::future::BoxFuture;
use synthient_client::{
    AnonymizersQuery, Client, ClientError, HttpClient, HttpRequest, HttpResponse, Result,
};

/// Replays a fixed response and remembers every request URL.
struct Recorder {
    status: u16,
    body: &'static str,
    calls: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn new(status: u16, body: &'static str) -> Self {
        Self {
            status,
            body,
            calls: Arc::new(AtomicUsize::new(0)),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl HttpClient for Recorder {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(request.url.to_string());
            Ok(HttpResponse::from_bytes(self.status, self.body))
        })
    }
}

#[tokio::test]
async fn test_default_base_urls() {
    let recorder = Recorder::new(200, r#"{"ip":"1.1.1.1"}"#);
    let urls = recorder.urls.clone();
    let client = Client::new("token").with_transport(recorder);

    client.get_ip("1.1.1.1", None).await.unwrap();
    client
        .stream_anonymizers_feed(&AnonymizersQuery::new().format("CSV"), None)
        .await
        .unwrap();

    let urls = urls.lock().unwrap();
    assert_eq!(
        urls[0],
        "https://v3api.synthient.com/api/v3/lookup/ip/1.1.1.1"
    );
    assert_eq!(
        urls[1],
        "https://feeds.synthient.com/v3/feeds/anonymizers?full=false&format=CSV&order="
    );
}

#[tokio::test]
async fn test_missing_token_short_circuits_every_endpoint() {
    let recorder = Recorder::new(200, "{}");
    let calls = recorder.calls.clone();
    let client = Client::new("").with_transport(recorder);
    let dir = tempfile::tempdir().unwrap();

    let lookup = client.get_ip("1.1.1.1", None).await.unwrap_err();
    let stream = client
        .stream_anonymizers_feed(&AnonymizersQuery::new(), None)
        .await
        .unwrap_err();
    let download = client
        .download_anonymizers_feed(&AnonymizersQuery::new(), dir.path().join("f.csv"), None)
        .await
        .unwrap_err();

    for err in [lookup, stream, download] {
        assert!(matches!(err, ClientError::Unauthenticated), "got {err:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("f.csv").exists());
}

#[tokio::test]
async fn test_invalid_base_url() {
    let client = Client::new("token")
        .with_transport(Recorder::new(200, "{}"))
        .with_api_base("not a url");

    let err = client.get_ip("1.1.1.1", None).await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidUrl { .. }), "got {err:?}");
}
