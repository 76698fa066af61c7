// src/remote/http.rs
// =============================================================================
// Network transport: one GET per URL, redirects followed by reqwest.
//
// Key functionality:
// - Builds the shared reqwest Client (connect timeout, redirect cap, source
//   address)
// - Issues every request under a slot of the shared concurrency limiter
// - Reports the final URL after redirects so the caller can classify it
// - Exposes the body either as text (listings) or as a byte stream (files)
//
// The limiter slot is released as soon as send() returns, i.e. once the
// status line and headers are in. Body processing (parsing a listing,
// streaming a file to disk) does not count against the cap: the cap bounds
// concurrent requests, not concurrent work.
//
// Timeouts are idle timeouts. Waiting for headers and waiting for each body
// chunk are bounded separately, so a multi-gigabyte file that keeps
// arriving never times out, while a stalled one does.
// =============================================================================

use std::io;
use std::net::IpAddr;
use std::pin::pin;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, trace};
use url::Url;

use crate::error::{MirrorError, Result};

/// How many redirect hops a single fetch may follow.
pub const MAX_REDIRECTS: usize = 10;

/// Builds the client shared by every crawl task.
///
/// `connect_timeout` bounds connection setup only; `fetch` bounds the rest.
/// `bind` pins outgoing connections to a local source address.
pub fn build_client(connect_timeout: Duration, bind: Option<IpAddr>) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(concat!("treemirror/", env!("CARGO_PKG_VERSION")));

    if let Some(addr) = bind {
        builder = builder.local_address(addr);
    }

    builder
        .build()
        .map_err(|e| MirrorError::Config(format!("cannot build HTTP client: {}", e)))
}

/// A response whose headers have arrived.
#[derive(Debug)]
pub struct Fetched {
    /// URL after following every redirect.
    pub final_url: Url,
    pub status: StatusCode,
    response: Response,
    idle: Duration,
}

impl Fetched {
    /// Whether the response is an HTML page.
    pub fn is_html(&self) -> bool {
        is_html(self.response.headers())
    }

    /// Reads the whole body as (lossy UTF-8) text. Used for listings only.
    pub async fn text(self) -> Result<String> {
        let mut body = Vec::new();
        let mut chunks = pin!(self.into_stream());
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Body as a stream of chunks.
    ///
    /// Each chunk must arrive within the idle timeout. The stream ends after
    /// its first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> {
        let url = self.final_url.to_string();
        let idle = self.idle;
        let body = Box::pin(self.response.bytes_stream());

        stream::unfold(Some(body), move |state| {
            let url = url.clone();
            async move {
                let Some(mut body) = state else {
                    return None;
                };
                match timeout(idle, body.next()).await {
                    Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                    Ok(Some(Err(e))) => Some((Err(MirrorError::network(url, e)), None)),
                    Ok(None) => None,
                    Err(_) => Some((
                        Err(MirrorError::transfer(url, stalled("body data", idle))),
                        None,
                    )),
                }
            }
        })
    }
}

/// GETs `url` while holding one limiter slot.
///
/// `idle` bounds the wait for the response headers and, later, for every
/// body chunk. Transport failures become `Network` or `Transfer`; status
/// codes are not judged here.
pub async fn fetch(
    client: &Client,
    limiter: &Semaphore,
    url: &Url,
    idle: Duration,
) -> Result<Fetched> {
    let sent = {
        let _permit = limiter
            .acquire()
            .await
            .map_err(|_| MirrorError::Config("request limiter was closed".to_string()))?;
        trace!(url = %url, available = limiter.available_permits(), "request slot acquired");
        timeout(idle, client.get(url.clone()).send()).await
        // permit dropped here: the slot frees before the body is read
    };

    let response = match sent {
        Ok(result) => result.map_err(|e| MirrorError::network(url.as_str(), e))?,
        Err(_) => {
            return Err(MirrorError::transfer(
                url.as_str(),
                stalled("response headers", idle),
            ))
        }
    };
    let final_url = response.url().clone();
    let status = response.status();
    debug!(url = %url, final_url = %final_url, status = status.as_u16(), "fetched");

    Ok(Fetched {
        final_url,
        status,
        response,
        idle,
    })
}

fn stalled(waiting_for: &str, idle: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("no {} received for {:?}", waiting_for, idle),
    )
}

/// `text/html` or `application/xhtml+xml`, parameters ignored.
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let mime = v.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[test]
    fn test_is_html_ignores_parameters_and_case() {
        assert!(is_html(&headers("text/html")));
        assert!(is_html(&headers("Text/HTML; charset=utf-8")));
        assert!(is_html(&headers("application/xhtml+xml")));
        assert!(!is_html(&headers("application/octet-stream")));
        assert!(!is_html(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn test_fetch_reports_final_url_after_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5), None).unwrap();
        let limiter = Semaphore::new(1);
        let url = Url::parse(&format!("{}/old", server.uri())).unwrap();

        let fetched = fetch(&client, &limiter, &url, Duration::from_secs(5)).await.unwrap();
        assert_eq!(fetched.final_url.path(), "/new");
        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_slot_is_released_before_body_is_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5), None).unwrap();
        let limiter = Arc::new(Semaphore::new(1));
        let url = Url::parse(&format!("{}/file", server.uri())).unwrap();

        let fetched = fetch(&client, &limiter, &url, Duration::from_secs(5)).await.unwrap();
        // body still unread, but the single slot is already free again
        assert_eq!(limiter.available_permits(), 1);
        drop(fetched);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let client = build_client(Duration::from_secs(2), None).unwrap();
        let limiter = Semaphore::new(1);
        // port 9 (discard) is essentially never listening on loopback
        let url = Url::parse("http://127.0.0.1:9/").unwrap();

        let err = fetch(&client, &limiter, &url, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, MirrorError::Network { .. }));
    }

    // one response whose 30-byte body arrives in three chunks, `gap` apart
    async fn trickling_server(gap: Duration) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\n\
                        Content-Type: application/octet-stream\r\n\
                        Content-Length: 30\r\n\
                        Connection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for _ in 0..3 {
                tokio::time::sleep(gap).await;
                if socket.write_all(&[b'x'; 10]).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
        });
        Url::parse(&format!("http://{}/big.iso", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_slow_body_outlasting_the_timeout_still_completes() {
        let url = trickling_server(Duration::from_millis(400)).await;
        let client = build_client(Duration::from_secs(1), None).unwrap();
        let limiter = Semaphore::new(1);

        // 1.2 s of streaming against a 1 s timeout: only idle time counts
        let fetched = fetch(&client, &limiter, &url, Duration::from_secs(1))
            .await
            .unwrap();
        let chunks: Vec<Result<Bytes>> = fetched.into_stream().collect().await;

        let mut total = 0;
        for chunk in chunks {
            total += chunk.unwrap().len();
        }
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn test_stalled_body_is_a_network_failure() {
        let url = trickling_server(Duration::from_millis(1500)).await;
        let client = build_client(Duration::from_secs(1), None).unwrap();
        let limiter = Semaphore::new(1);

        let fetched = fetch(&client, &limiter, &url, Duration::from_millis(300))
            .await
            .unwrap();
        let chunks: Vec<Result<Bytes>> = fetched.into_stream().collect().await;

        assert_eq!(chunks.len(), 1, "the stream ends at its first error");
        let err = chunks.into_iter().next().unwrap().unwrap_err();
        assert!(matches!(err, MirrorError::Transfer { .. }));
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test]
    async fn test_missing_headers_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(1), None).unwrap();
        let limiter = Semaphore::new(1);
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();

        let err = fetch(&client, &limiter, &url, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Transfer { .. }));
        assert_eq!(limiter.available_permits(), 1);
    }
}
