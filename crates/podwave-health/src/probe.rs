//! HTTP probe client.
//!
//! Sends a single validation request to a pod and hands back the status
//! and full body. [`HttpProber`] speaks plain HTTP/1.1 over a fresh TCP
//! connection per probe, which is what pod IPs inside a cluster network
//! expect.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use thiserror::Error;
use tracing::debug;

/// Boxed future alias for probe results.
pub type ProbeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProbeResponse, ProbeError>> + Send + 'a>>;

/// Errors raised before a response is received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("invalid probe url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid probe request: {0}")]
    InvalidRequest(String),

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("http exchange failed: {0}")]
    Http(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

/// A fully rendered validation request for one pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Status and body of a probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProbeResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues probe requests. Injected so validation can be tested offline.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, request: &'a ProbeRequest) -> ProbeFuture<'a>;
}

/// [`Prober`] over hyper's HTTP/1.1 client connection.
#[derive(Debug, Clone)]
pub struct HttpProber {
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        match tokio::time::timeout(self.timeout, exchange(request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(url = %request.url, "probe timed out");
                Err(ProbeError::Timeout(self.timeout))
            }
        }
    }
}

impl Prober for HttpProber {
    fn probe<'a>(&'a self, request: &'a ProbeRequest) -> ProbeFuture<'a> {
        Box::pin(self.send(request))
    }
}

/// Where to connect and what to put on the request line.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    address: String,
    host: String,
    path: String,
}

fn parse_target(url: &str) -> Result<Target, ProbeError> {
    let invalid = |reason: &str| ProbeError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|_| invalid("not a valid URI"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme {other}"))),
        None => return Err(invalid("missing scheme")),
    }
    let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
    let port = authority.port_u16().unwrap_or(80);
    let host = authority.host();

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());

    Ok(Target {
        address: format!("{host}:{port}"),
        host: authority.as_str().to_string(),
        path,
    })
}

async fn exchange(request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
    let target = parse_target(&request.url)?;
    let req = build_http_request(request, &target)?;

    let stream = tokio::net::TcpStream::connect(&target.address)
        .await
        .map_err(|e| {
            debug!(error = %e, url = %request.url, "probe connection failed");
            ProbeError::Connect {
                address: target.address.clone(),
                reason: e.to_string(),
            }
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ProbeError::Http(format!("handshake: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| ProbeError::Http(e.to_string()))?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| ProbeError::Http(format!("reading body: {e}")))?
        .to_bytes();

    Ok(ProbeResponse { status, body })
}

/// Assemble the wire request. Configured headers replace the `Host` and
/// `User-Agent` defaults rather than adding to them.
fn build_http_request(
    request: &ProbeRequest,
    target: &Target,
) -> Result<http::Request<Full<Bytes>>, ProbeError> {
    let body = request.body.clone().map(Bytes::from).unwrap_or_default();
    let mut req = http::Request::builder()
        .method(request.method.clone())
        .uri(&target.path)
        .header(http::header::HOST, &target.host)
        .header(http::header::USER_AGENT, concat!("podwave/", env!("CARGO_PKG_VERSION")))
        .body(Full::new(body))
        .map_err(|e| ProbeError::InvalidRequest(e.to_string()))?;

    let headers = req.headers_mut();
    for (name, value) in &request.headers {
        let name = http::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProbeError::InvalidRequest(format!("header {name:?}: {e}")))?;
        let value = http::HeaderValue::from_str(value)
            .map_err(|e| ProbeError::InvalidRequest(format!("header {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn get(url: &str) -> ProbeRequest {
        ProbeRequest {
            method: Method::GET,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn parse_target_defaults_port_and_path() {
        let target = parse_target("http://10.0.0.7").unwrap();
        assert_eq!(target.address, "10.0.0.7:80");
        assert_eq!(target.host, "10.0.0.7");
        assert_eq!(target.path, "/");
    }

    #[test]
    fn parse_target_keeps_query() {
        let target = parse_target("http://10.0.0.7:8080/ready?deep=1").unwrap();
        assert_eq!(target.address, "10.0.0.7:8080");
        assert_eq!(target.host, "10.0.0.7:8080");
        assert_eq!(target.path, "/ready?deep=1");
    }

    #[test]
    fn parse_target_rejects_https_and_relative() {
        assert!(matches!(
            parse_target("https://10.0.0.7/healthz"),
            Err(ProbeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_target("/healthz"),
            Err(ProbeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn configured_host_replaces_default() {
        let mut request = get("http://10.0.0.1:8080/healthz");
        request.headers.push(("Host".to_string(), "api.internal".to_string()));
        request.headers.push(("x-token".to_string(), "abc".to_string()));
        let target = parse_target(&request.url).unwrap();

        let req = build_http_request(&request, &target).unwrap();
        let hosts: Vec<_> = req.headers().get_all(http::header::HOST).iter().collect();
        assert_eq!(hosts, vec!["api.internal"]);
        assert_eq!(req.headers()["x-token"], "abc");
        assert!(req.headers().contains_key(http::header::USER_AGENT));
    }

    #[test]
    fn default_host_is_the_pod_address() {
        let request = get("http://10.0.0.1:8080/healthz");
        let target = parse_target(&request.url).unwrap();

        let req = build_http_request(&request, &target).unwrap();
        assert_eq!(req.headers()[http::header::HOST], "10.0.0.1:8080");
        assert_eq!(req.uri(), "/healthz");
    }

    #[tokio::test]
    async fn probe_to_closed_port_fails_to_connect() {
        let prober = HttpProber::new(Duration::from_millis(500));
        let result = prober.probe(&get("http://127.0.0.1:1/healthz")).await;
        assert!(matches!(
            result,
            Err(ProbeError::Connect { .. }) | Err(ProbeError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn probe_reads_status_and_body() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let body = r#"{"status":"ok"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });

        let prober = HttpProber::new(Duration::from_secs(5));
        let mut request = get(&format!("http://{addr}/healthz"));
        request.headers.push(("x-probe".to_string(), "podwave".to_string()));
        let response = prober.probe(&request).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], br#"{"status":"ok"}"#);

        let seen = server.await.unwrap();
        assert!(seen.starts_with("GET /healthz HTTP/1.1\r\n"));
        assert!(seen.to_ascii_lowercase().contains("x-probe: podwave"));
    }

    #[tokio::test]
    async fn probe_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let prober = HttpProber::new(Duration::from_millis(100));
        let result = prober.probe(&get(&format!("http://{addr}/healthz"))).await;
        assert_eq!(result, Err(ProbeError::Timeout(Duration::from_millis(100))));
    }
}
