//! Remote files read through HTTP byte-range requests
//!
//! A [`RemoteFile`] tracks how many bytes of a URL were already delivered and
//! turns each poll into a `Range: bytes=<offset>-` request.

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use reqwest::header::{
    ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, RANGE,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::core::error::{Error, Result};
use crate::core::options::Whence;
use crate::core::transport::{accept_encoding, find_decompressor};

/// Statuses after which the response is usable
const GOOD_STATUSES: [StatusCode; 4] = [
    StatusCode::RANGE_NOT_SATISFIABLE,
    StatusCode::OK,
    StatusCode::PARTIAL_CONTENT,
    StatusCode::NO_CONTENT,
];

/// Statuses meaning "not there right now"
const TEMPFAIL_STATUSES: [StatusCode; 2] = [StatusCode::NOT_FOUND, StatusCode::LOCKED];

/// Result of one poll of a remote file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// New bytes, already decompressed
    Data(Bytes),
    /// Nothing appended since the last read
    NoData,
    /// Resource temporarily unavailable
    TempFail(String),
    /// Status that we do not know how to handle
    ProtocolError(StatusCode),
    /// Malformed response, or a kept-alive connection that could not carry
    /// the request; the next poll runs on a fresh connection
    Interrupted(String),
    /// Response we cannot interpret
    FormatError(String),
}

/// A remote resource presented as a seekable, growing byte source
#[derive(Debug)]
pub struct RemoteFile {
    url: Url,
    client: Client,
    auth: Option<String>,
    offset: u64,
    encoding: &'static Encoding,
}

impl RemoteFile {
    /// Create a remote file positioned at offset 0.
    ///
    /// `auth` is a Basic auth token sent with every request.
    pub fn new(url: Url, client: Client, auth: Option<String>) -> Self {
        Self {
            url,
            client,
            auth,
            offset: 0,
            encoding: UTF_8,
        }
    }

    /// Bytes delivered so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Text encoding announced by the last successful read
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Current remote length, from a HEAD request
    pub async fn probe_length(&self) -> Result<u64> {
        let response = self.request(Method::HEAD).send().await?;
        let status = response.status();
        if !GOOD_STATUSES.contains(&status) {
            return Err(Error::Protocol(status));
        }
        content_length(&response)?
            .ok_or_else(|| Error::Format("server does not report content-length".to_string()))
    }

    /// Fetch bytes appended since the last read, at most `max_length` + 1.
    ///
    /// Only transport failures that are fatal for the resource come back as
    /// `Err`; every status-driven condition is a [`ReadOutcome`].
    pub async fn read(&mut self, max_length: Option<u64>) -> Result<ReadOutcome> {
        match self.fetch(max_length).await {
            Ok(Some(body)) if !body.is_empty() => Ok(ReadOutcome::Data(body)),
            Ok(_) => Ok(ReadOutcome::NoData),
            Err(Error::TempFail(reason)) => Ok(ReadOutcome::TempFail(reason)),
            Err(Error::Protocol(status)) => Ok(ReadOutcome::ProtocolError(status)),
            Err(Error::Format(reason)) => Ok(ReadOutcome::FormatError(reason)),
            Err(Error::StaleConnection(reason)) => {
                debug!("{}: {reason}", self.url);
                Ok(ReadOutcome::Interrupted(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Move the read position; the result is clamped to zero.
    ///
    /// Seeking from the end probes the remote length first.
    pub async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => to_signed(self.offset),
            Whence::End => to_signed(self.probe_length().await?),
        };
        self.offset = u64::try_from(base.saturating_add(offset)).unwrap_or(0);
        Ok(self.offset)
    }

    async fn fetch(&mut self, max_length: Option<u64>) -> Result<Option<Bytes>> {
        let mut range = format!("bytes={}-", self.offset);
        if let Some(length) = max_length {
            range.push_str(&self.offset.saturating_add(length).to_string());
        }

        let response = self
            .request(Method::GET)
            .header(RANGE, range)
            .header(ACCEPT_ENCODING, accept_encoding())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(None);
        }
        if GOOD_STATUSES.contains(&status) {
            // Some servers omit the header for empty bodies
            if content_length(&response)?.is_none() {
                return Ok(None);
            }
            let content_encoding = header_str(&response, CONTENT_ENCODING)
                .unwrap_or("identity")
                .trim()
                .to_ascii_lowercase();
            let charset = header_str(&response, CONTENT_TYPE).and_then(charset_encoding);

            let raw = response.bytes().await?;
            let body = if content_encoding == "identity" {
                raw
            } else {
                let decompressor = find_decompressor(&content_encoding).ok_or_else(|| {
                    Error::Format(format!("unsupported content-encoding '{content_encoding}'"))
                })?;
                let decoded = (decompressor.decode)(&raw).map_err(|e| {
                    Error::Format(format!("cannot decode {content_encoding} body: {e}"))
                })?;
                Bytes::from(decoded)
            };

            self.offset += body.len() as u64;
            self.encoding = charset.unwrap_or(UTF_8);
            return Ok(Some(body));
        }
        if TEMPFAIL_STATUSES.contains(&status) {
            return Err(Error::TempFail(status.to_string()));
        }
        Err(Error::Protocol(status))
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let request = self.client.request(method, self.url.clone());
        match &self.auth {
            Some(token) => request.header(AUTHORIZATION, format!("Basic {token}")),
            None => request,
        }
    }
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn header_str(response: &Response, name: reqwest::header::HeaderName) -> Option<&str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Content-Length as announced by the server (not the body size hint,
/// which is always zero for HEAD)
fn content_length(response: &Response) -> Result<Option<u64>> {
    match header_str(response, CONTENT_LENGTH) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Format(format!("invalid content-length '{value}'"))),
    }
}

/// Encoding named by the charset parameter of a Content-Type value
fn charset_encoding(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches(['"', '\'']))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
}
