//! Value parsers for clap arguments

use std::path::PathBuf;
use std::time::Duration;

/// Parse a non-negative number of seconds, fractions allowed
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds '{value}'"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("invalid number of seconds '{value}': must be a finite, non-negative value"))
}

pub fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("'{value}' is not a readable file"))
    }
}

pub fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("'{value}' is not a directory"))
    }
}
