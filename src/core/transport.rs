//! HTTP transport setup for htail
//!
//! Builds the reqwest client each remote file owns, and the table of
//! content-encodings we know how to decode ourselves.

use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::{Certificate, Client, ClientBuilder};

use crate::core::error::{Error, Result};
use crate::core::options::TlsOptions;

/// Decoder for one HTTP content-encoding
pub struct Decompressor {
    /// Token used in Accept-Encoding / Content-Encoding
    pub name: &'static str,
    /// Decodes a content-encoded body
    pub decode: fn(&[u8]) -> std::io::Result<Vec<u8>>,
}

#[cfg(feature = "gzip")]
const DECOMPRESSORS: &[Decompressor] = &[
    Decompressor {
        name: "gzip",
        decode: gunzip,
    },
    Decompressor {
        name: "deflate",
        decode: inflate,
    },
];

#[cfg(not(feature = "gzip"))]
const DECOMPRESSORS: &[Decompressor] = &[];

#[cfg(feature = "gzip")]
fn gunzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::MultiGzDecoder::new(body).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(feature = "gzip")]
fn inflate(body: &[u8]) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(body).read_to_end(&mut out)?;
    Ok(out)
}

/// Value for the Accept-Encoding request header (empty in the default build)
pub fn accept_encoding() -> String {
    DECOMPRESSORS
        .iter()
        .map(|d| d.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the decompressor for a (lowercase) content-encoding token
pub fn find_decompressor(name: &str) -> Option<&'static Decompressor> {
    DECOMPRESSORS.iter().find(|d| d.name == name)
}

/// Build a client for a single remote file.
///
/// Every remote file gets its own client so that connections are never
/// shared between resources.
pub fn build_client(tls: &TlsOptions) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(1)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(format!("htail/{}", env!("HTAIL_VERSION")));

    if tls.has_custom_roots() {
        builder = builder.tls_built_in_root_certs(false);
        for cert in load_trust_roots(tls)? {
            builder = builder.add_root_certificate(cert);
        }
    }

    if tls.insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}

/// Load certificates from the configured CA file and CA directory
fn load_trust_roots(tls: &TlsOptions) -> Result<Vec<Certificate>> {
    let mut roots = Vec::new();

    if let Some(ca_file) = &tls.ca_file {
        let certs = read_pem_bundle(ca_file)?;
        if certs.is_empty() {
            return Err(Error::Tls(format!(
                "no certificate found in {}",
                ca_file.display()
            )));
        }
        roots.extend(certs);
    }

    if let Some(ca_path) = &tls.ca_path {
        let mut files = std::fs::read_dir(ca_path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        files.sort();

        let before = roots.len();
        for file in files {
            match read_pem_bundle(&file) {
                Ok(certs) => roots.extend(certs),
                Err(e) => debug!("skipping {}: {e}", file.display()),
            }
        }
        if roots.len() == before {
            return Err(Error::Tls(format!(
                "no certificate found in directory {}",
                ca_path.display()
            )));
        }
    }

    Ok(roots)
}

fn read_pem_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let pem = std::fs::read(path)?;
    Certificate::from_pem_bundle(&pem)
        .map_err(|e| Error::Tls(format!("{}: {e}", path.display())))
}
