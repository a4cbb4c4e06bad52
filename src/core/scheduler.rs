//! Polling loop over several remote files
//!
//! Each sweep reads every file whose deadline has passed, in input order,
//! writes what it got, and reschedules the file with an adaptive interval.
//! Between sweeps the scheduler sleeps until the earliest deadline.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::AsyncWrite;
use tokio::time::Instant;

use crate::core::auth::{self, CredentialLookup};
use crate::core::error::{Error, Result};
use crate::core::options::TailOptions;
use crate::core::output::{OutputMultiplexer, SourceId};
use crate::core::remote::{ReadOutcome, RemoteFile};
use crate::core::transport::build_client;

/// Interval to wait before polling a file again.
///
/// Doubles (capped at `max`) after an empty or failed read, and goes back
/// to `min` after a read that produced data.
pub fn next_interval(previous: Duration, min: Duration, max: Duration, productive: bool) -> Duration {
    if productive {
        min
    } else {
        previous.saturating_mul(2).min(max)
    }
}

/// What the scheduler does with an entry after a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Write the data, then keep polling (`keep`) or retire the entry
    Emit { keep: bool },
    /// Keep the entry and poll it less often
    Backoff,
    /// Remove the entry for good
    Drop,
}

pub fn disposition(outcome: &ReadOutcome, follow: bool, retry: bool) -> Disposition {
    match outcome {
        ReadOutcome::Data(_) => Disposition::Emit { keep: follow },
        ReadOutcome::NoData if follow => Disposition::Backoff,
        ReadOutcome::NoData => Disposition::Drop,
        ReadOutcome::TempFail(_) if retry => Disposition::Backoff,
        ReadOutcome::TempFail(_) => Disposition::Drop,
        // Keep-alive hiccup, not a verdict on the resource
        ReadOutcome::Interrupted(_) => Disposition::Backoff,
        ReadOutcome::ProtocolError(_) | ReadOutcome::FormatError(_) => Disposition::Drop,
    }
}

/// One polled file and its schedule
#[derive(Debug)]
pub struct ScheduleEntry {
    id: SourceId,
    label: String,
    file: RemoteFile,
    deadline: Instant,
    interval: Duration,
}

impl ScheduleEntry {
    pub fn file(&self) -> &RemoteFile {
        &self.file
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Drives reads over all active files and merges their output
pub struct PollScheduler<W> {
    entries: Vec<ScheduleEntry>,
    output: OutputMultiplexer<W>,
    follow: bool,
    retry: bool,
    sleep_min: Duration,
    sleep_max: Duration,
}

impl<W: AsyncWrite + Unpin> PollScheduler<W> {
    /// Schedule `sources` (label and file, in input order), all due now
    pub fn new(writer: W, sources: Vec<(String, RemoteFile)>, options: &TailOptions) -> Self {
        let now = Instant::now();
        let entries: Vec<ScheduleEntry> = sources
            .into_iter()
            .enumerate()
            .map(|(id, (label, file))| ScheduleEntry {
                id,
                label,
                file,
                deadline: now,
                interval: options.sleep_min,
            })
            .collect();
        let ids: Vec<SourceId> = entries.iter().map(|e| e.id).collect();

        Self {
            output: OutputMultiplexer::new(writer, options.quiet, options.verbose, &ids),
            entries,
            follow: options.follow,
            retry: options.retry,
            sleep_min: options.sleep_min,
            sleep_max: options.sleep_max.max(options.sleep_min),
        }
    }

    /// Entries still being polled
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Poll until no entry is left, then hand the writer back
    pub async fn run(mut self) -> Result<W> {
        while let Some(wake) = self.sweep().await? {
            if wake > Instant::now() {
                self.output.flush().await?;
                tokio::time::sleep_until(wake).await;
            }
        }
        self.output.flush().await?;
        Ok(self.output.into_inner())
    }

    /// Poll every due entry once; returns the earliest remaining deadline
    async fn sweep(&mut self) -> Result<Option<Instant>> {
        let mut carried = Vec::with_capacity(self.entries.len());

        for mut entry in std::mem::take(&mut self.entries) {
            let now = Instant::now();
            if entry.deadline > now {
                carried.push(entry);
                continue;
            }

            let outcome = entry.file.read(None).await?;
            let productive = match disposition(&outcome, self.follow, self.retry) {
                Disposition::Emit { keep } => {
                    if let ReadOutcome::Data(data) = &outcome {
                        self.output
                            .write(entry.id, &entry.label, entry.file.encoding(), data)
                            .await?;
                    }
                    if !keep {
                        debug!("{}: done", entry.label);
                        continue;
                    }
                    true
                }
                Disposition::Backoff => {
                    match &outcome {
                        ReadOutcome::TempFail(reason) | ReadOutcome::Interrupted(reason) => {
                            debug!("{}: {reason}, will retry", entry.label)
                        }
                        _ => {}
                    }
                    false
                }
                Disposition::Drop => {
                    match &outcome {
                        ReadOutcome::ProtocolError(status) => {
                            info!("{}: dropped after HTTP {status}", entry.label)
                        }
                        ReadOutcome::FormatError(reason) => {
                            warn!("{}: dropped, {reason}", entry.label)
                        }
                        ReadOutcome::TempFail(reason) => {
                            info!("{}: dropped, {reason}", entry.label)
                        }
                        _ => debug!("{}: no new data", entry.label),
                    }
                    continue;
                }
            };

            entry.interval =
                next_interval(entry.interval, self.sleep_min, self.sleep_max, productive);
            entry.deadline = now + entry.interval;
            carried.push(entry);
        }

        let wake = carried.iter().map(|e| e.deadline).min();
        self.entries = carried;
        Ok(wake)
    }
}

/// Resolve, connect and position every URL before polling starts.
///
/// Resources whose initial seek fails are skipped unless `retry` is set, in
/// which case they start polling from offset 0. A response without length
/// always skips the resource.
pub async fn open_sources(
    urls: &[String],
    options: &TailOptions,
    lookup: &dyn CredentialLookup,
) -> Result<Vec<(String, RemoteFile)>> {
    let mut sources = Vec::with_capacity(urls.len());

    for raw in urls {
        let locator = auth::resolve(raw, lookup)?;
        let client = build_client(&options.tls)?;
        let mut file = RemoteFile::new(locator.url, client, locator.auth);

        match file.seek(options.offset, options.whence).await {
            Ok(offset) => debug!("{}: starting at byte {offset}", locator.label),
            Err(Error::Format(reason)) => {
                warn!("{}: skipped, {reason}", locator.label);
                continue;
            }
            Err(e) if e.is_resource_failure() => {
                if !options.retry {
                    info!("{}: skipped, {e}", locator.label);
                    continue;
                }
                debug!("{}: {e}, will retry", locator.label);
            }
            Err(e) => return Err(e),
        }
        sources.push((locator.label, file));
    }

    Ok(sources)
}
