//! Mock remote files shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use url::Url;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::core::remote::RemoteFile;
use crate::core::transport::build_client;

/// A remote file whose content can grow while it is being polled.
///
/// Answers HEAD with the current length, and GET with everything from the
/// requested start offset (416 once nothing is left).
#[derive(Clone)]
pub struct GrowingFile(Arc<Mutex<Vec<u8>>>);

impl GrowingFile {
    pub fn new(content: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(content)))
    }

    pub fn append(&self, data: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(data);
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    pub async fn mount(&self, server: &MockServer, route: &str) {
        Mock::given(path(route))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }
}

impl Respond for GrowingFile {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let content = self.0.lock().unwrap();
        if request.method.as_str() == "HEAD" {
            return ResponseTemplate::new(200)
                .insert_header("content-length", content.len().to_string().as_str());
        }

        let start = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split('-').next())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        if start >= content.len() {
            ResponseTemplate::new(416)
        } else {
            ResponseTemplate::new(206).set_body_bytes(content[start..].to_vec())
        }
    }
}

/// Remote file for `route` on `server`, at offset 0, without credentials
pub fn remote_file(server: &MockServer, route: &str) -> RemoteFile {
    let url = Url::parse(&format!("{}{route}", server.uri())).unwrap();
    RemoteFile::new(url, build_client(&Default::default()).unwrap(), None)
}

/// Reply with a complete 206 body, closing the connection afterwards
pub fn partial_content(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 206 Partial Content\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// Bare TCP server for responses wiremock cannot produce.
///
/// Connection `n` gets `replies[n]` (the last one repeats) once its request
/// headers are in, then the socket is closed. Returns the base URL and the
/// number of connections accepted so far.
pub async fn raw_server(replies: Vec<Vec<u8>>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let reply = replies[n.min(replies.len() - 1)].clone();

            // Drain the request so closing does not reset the connection
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => request.extend_from_slice(&buf[..read]),
                }
            }
            let _ = socket.write_all(&reply).await;
            let _ = socket.shutdown().await;
        }
    });

    (base, hits)
}

/// Remote file for `route` on a [`raw_server`]
pub fn raw_remote_file(base: &str, route: &str) -> RemoteFile {
    let url = Url::parse(&format!("{base}{route}")).unwrap();
    RemoteFile::new(url, build_client(&Default::default()).unwrap(), None)
}
