//! Run configuration for htail
//!
//! Plain data consumed by the library; the CLI is one producer of it.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of trailing bytes to show
pub const DEFAULT_OFFSET: i64 = 1024;

/// Default poll interval after new data
pub const SLEEP_MIN: Duration = Duration::from_secs(1);

/// Default upper bound for the idle poll interval
pub const SLEEP_MAX: Duration = Duration::from_secs(16);

/// Reference point for a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute offset from the start of the resource
    Start,
    /// Relative to the bytes already delivered
    Current,
    /// Relative to the current remote length
    End,
}

/// Where credentials for URLs without user-info come from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetrcSource {
    /// No lookup
    #[default]
    Disabled,
    /// `$HOME/.netrc`, ignored when absent
    DefaultLocation,
    /// Explicit file, which must exist
    Path(PathBuf),
}

/// TLS trust settings for https URLs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlsOptions {
    /// PEM file with trusted CA certificates
    pub ca_file: Option<PathBuf>,
    /// Directory of PEM files with trusted CA certificates
    pub ca_path: Option<PathBuf>,
    /// Accept any server certificate
    pub insecure: bool,
}

impl TlsOptions {
    /// Whether the built-in trust roots are replaced by explicit ones
    pub fn has_custom_roots(&self) -> bool {
        self.ca_file.is_some() || self.ca_path.is_some()
    }
}

/// Options for a tail run
#[derive(Debug, Clone)]
pub struct TailOptions {
    /// Starting offset, interpreted against `whence`
    pub offset: i64,

    /// Reference point for `offset`
    pub whence: Whence,

    /// Keep polling for appended data
    pub follow: bool,

    /// Keep unavailable resources instead of dropping them
    pub retry: bool,

    /// Poll interval after a non-empty read
    pub sleep_min: Duration,

    /// Cap for the doubling idle interval
    pub sleep_max: Duration,

    /// Never print headers
    pub quiet: bool,

    /// Always print headers
    pub verbose: bool,

    /// Credential lookup for URLs without user-info
    pub netrc: NetrcSource,

    /// TLS trust settings
    pub tls: TlsOptions,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            offset: -DEFAULT_OFFSET,
            whence: Whence::End,
            follow: false,
            retry: false,
            sleep_min: SLEEP_MIN,
            sleep_max: SLEEP_MAX,
            quiet: false,
            verbose: false,
            netrc: NetrcSource::default(),
            tls: TlsOptions::default(),
        }
    }
}

impl TailOptions {
    /// Copy of these options with `sleep_max` raised to at least `sleep_min`
    pub fn normalized(&self) -> Self {
        Self {
            sleep_max: self.sleep_max.max(self.sleep_min),
            ..self.clone()
        }
    }
}
