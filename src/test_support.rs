//! Scripted HTTP/1.1 server for probe tests.
//!
//! Responses are written by hand so a test controls exactly which headers are
//! present, in particular whether `Content-Length` is sent at all.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = Arc<dyn Fn(&str, &str) -> Reply + Send + Sync>;

#[derive(Debug, Clone)]
pub struct Reply {
    status: &'static str,
    content_length: Option<u64>,
    body: Vec<u8>,
    delay: Duration,
    raw: Option<Vec<u8>>,
}

impl Reply {
    /// Headers only, no `Content-Length`.
    pub fn new(status: &'static str) -> Self {
        Self {
            status,
            content_length: None,
            body: Vec::new(),
            delay: Duration::ZERO,
            raw: None,
        }
    }

    /// Declares a length without sending a body (HEAD answers).
    pub fn with_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Body with a matching `Content-Length`.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.content_length = Some(body.len() as u64);
        self.body = body;
        self
    }

    /// Body delimited by connection close.
    pub fn with_unsized_body(mut self, body: Vec<u8>) -> Self {
        self.content_length = None;
        self.body = body;
        self
    }

    /// Bytes written verbatim in place of a generated response, then close.
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: Some(bytes.into()),
            ..Self::new("200 OK")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let recorded = requests.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, handler, recorded).await;
                });
            }
        });

        Self {
            addr,
            requests,
            accept_task,
        }
    }

    /// A URL on a loopback port that nothing listens on.
    pub async fn unused_port_url(path: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        drop(listener);
        format!("http://{addr}{path}")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    handler: Handler,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("").to_string();
    let path = request_line.next().unwrap_or("").to_string();
    let user_agent = lines.take_while(|l| !l.is_empty()).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("user-agent")
            .then(|| value.trim().to_string())
    });

    recorded.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        user_agent,
    });

    let reply = handler(&method, &path);
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    if let Some(raw) = &reply.raw {
        stream.write_all(raw).await?;
        return stream.shutdown().await;
    }

    let mut response = format!("HTTP/1.1 {}\r\n", reply.status);
    if let Some(length) = reply.content_length {
        response.push_str(&format!("Content-Length: {length}\r\n"));
    }
    response.push_str("Connection: close\r\n\r\n");

    stream.write_all(response.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(&reply.body).await?;
    }
    stream.shutdown().await
}
