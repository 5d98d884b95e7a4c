//! Log persistence: fetch an accepted event's log and write it to disk
//!
//! Each event produces two files under the output directory, both named
//! from the sanitized log URL: the raw body and a JSON sidecar holding the
//! event itself. Identical URLs map to identical paths, so re-harvesting a
//! log overwrites the previous copy.

use std::path::{Path, PathBuf};

use harvest_logging::spans;
use tracing::{Instrument, debug, info_span, warn};

use crate::dump;
use crate::error::{HarvestError, HarvestResult};
use crate::event::TestEvent;
use crate::fetch::LogFetcher;

/// Files written for one harvested log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedLog {
    /// Raw log body
    pub log_path: PathBuf,
    /// JSON copy of the originating event
    pub sidecar_path: PathBuf,
    /// Size of the raw body
    pub bytes_written: usize,
}

/// Turn a log URL into a flat file name
///
/// Replaces `_` with `-`, then `/` with `_`, then drops `:`. The order
/// matters: underscores introduced for slashes must survive.
pub fn sanitize_log_url(url: &str) -> String {
    url.replace('_', "-").replace('/', "_").replace(':', "")
}

/// Sidecar file name for a sanitized log name
///
/// The last extension is swapped for `.json`. A name without an extension
/// gets `.json` appended, and a log that already ends in `.json` gets a
/// `.meta.json` sidecar so the log itself is never overwritten.
pub fn sidecar_name(sanitized: &str) -> String {
    let candidate = match sanitized.rfind('.') {
        Some(idx) => format!("{}.json", &sanitized[..idx]),
        None => format!("{sanitized}.json"),
    };
    if candidate == sanitized {
        format!("{sanitized}.meta.json")
    } else {
        candidate
    }
}

/// Fetches logs and writes them with their sidecars
pub struct LogPersister<F> {
    fetcher: F,
    output_dir: PathBuf,
    dump_to_console: bool,
}

impl<F: LogFetcher> LogPersister<F> {
    pub fn new(fetcher: F, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.into(),
            dump_to_console: false,
        }
    }

    /// Also print each harvested log to stdout
    pub fn with_console_dump(mut self, enabled: bool) -> Self {
        self.dump_to_console = enabled;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory if it does not exist
    ///
    /// Run once at startup; calling it again is harmless.
    pub async fn prepare(&self) -> HarvestResult<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| HarvestError::io(&self.output_dir, e))
    }

    /// Fetch the event's log and write the log and sidecar files
    ///
    /// Nothing is written unless the fetch succeeds.
    pub async fn persist(&self, event: &TestEvent) -> HarvestResult<PersistedLog> {
        let body = self
            .fetcher
            .fetch(&event.log_url)
            .instrument(info_span!(spans::FETCH_LOG, url = %event.log_url))
            .await?;

        let sanitized = sanitize_log_url(&event.log_url);
        let log_path = self.output_dir.join(&sanitized);
        let sidecar_path = self.output_dir.join(sidecar_name(&sanitized));
        let sidecar = serde_json::to_vec_pretty(event)?;

        async {
            tokio::fs::write(&log_path, &body)
                .await
                .map_err(|e| HarvestError::io(&log_path, e))?;
            tokio::fs::write(&sidecar_path, &sidecar)
                .await
                .map_err(|e| HarvestError::io(&sidecar_path, e))
        }
        .instrument(info_span!(spans::WRITE_LOG, path = %log_path.display()))
        .await?;

        debug!(
            log = %log_path.display(),
            sidecar = %sidecar_path.display(),
            bytes = body.len(),
            "Wrote log and sidecar"
        );

        if self.dump_to_console {
            self.dump(&event.log_url, &body);
        }

        Ok(PersistedLog {
            log_path,
            sidecar_path,
            bytes_written: body.len(),
        })
    }

    fn dump(&self, url: &str, body: &[u8]) {
        let text = match dump::decode_log_body(url, body) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Skipping console dump");
                return;
            }
        };
        let stdout = std::io::stdout();
        if let Err(e) = dump::write_dump(&mut stdout.lock(), url, &text) {
            warn!(error = %e, "Console dump failed");
        }
    }
}
