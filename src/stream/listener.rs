use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Timelike;
use tracing::{debug, info, warn};

use crate::api::health::SessionStats;
use crate::config::RATE_LIMIT_STATUSES;
use crate::error::Result;
use crate::stream::messages::{parse_stream_message, StreamMessage};
use crate::types::{Control, SessionState, StopCondition};

/// Receives stream traffic one message at a time, in delivery order.
pub trait StreamHandler {
    /// Called with every non-blank stream line.
    fn on_event(&mut self, raw: &str) -> Control;

    /// Called with the HTTP status of a rejected stream connection.
    fn on_error(&mut self, status: u16) -> Control;

    /// Called once when the session ends for any reason.
    fn on_close(&mut self) {}
}

/// Appends original statuses to a file until the stop condition fires.
pub struct FileListener {
    path: PathBuf,
    /// Some while streaming; taken (and so closed) on stop or error.
    /// Unbuffered blocking writes: one short append per event, so a failed write is seen at that event.
    file: Option<File>,
    stop: StopCondition,
    started_at: Instant,
    stats: Arc<SessionStats>,
}

impl FileListener {
    pub fn open(path: impl AsRef<Path>, stop: StopCondition, stats: Arc<SessionStats>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), stop = %stop, "Opened stream output");
        Ok(Self {
            path,
            file: Some(file),
            stop,
            started_at: Instant::now(),
            stats,
        })
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn close(&mut self, state: SessionState) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                warn!(path = %self.path.display(), "flush on close failed: {e}");
            }
            info!(path = %self.path.display(), state = %state, "Closed stream output");
        }
        self.stats.set_state(state);
    }

    /// Event handling with an explicit clock reading, so the stop decision
    /// can be exercised at exact elapsed times.
    pub fn on_event_at(&mut self, raw: &str, elapsed: Duration, local_hour: u32) -> Control {
        if self.file.is_none() {
            return Control::Stop;
        }

        let status = match parse_stream_message(raw) {
            Ok(StreamMessage::Status(status)) => status,
            Ok(StreamMessage::Disconnect { code, reason }) => {
                warn!(code, reason = %reason, "stream disconnect notice");
                return Control::Continue;
            }
            Ok(StreamMessage::Limit { track }) => {
                warn!(undelivered = track, "stream limit notice");
                return Control::Continue;
            }
            Ok(StreamMessage::Warning { message }) => {
                warn!("stream warning: {message}");
                return Control::Continue;
            }
            Ok(other) => {
                debug!(message = ?other, "skipping non-status message");
                return Control::Continue;
            }
            Err(e) => {
                let count = SessionStats::inc(&self.stats.parse_failures);
                if count <= 10 || count % 1000 == 0 {
                    let sample = raw.char_indices().nth(200).map_or(raw, |(i, _)| &raw[..i]);
                    warn!(count, "unparseable stream line ({e}): {sample}");
                }
                return Control::Continue;
            }
        };

        if !status.is_original() {
            SessionStats::inc(&self.stats.events_filtered);
            return Control::Continue;
        }

        if self.stop.should_stop(elapsed, local_hour) {
            info!(
                elapsed_secs = elapsed.as_secs_f64(),
                stop = %self.stop,
                "Stop condition reached"
            );
            self.close(SessionState::Stopped);
            return Control::Stop;
        }

        if let Some(file) = self.file.as_mut() {
            match file
                .write_all(raw.as_bytes())
                .and_then(|_| file.write_all(b"\n"))
            {
                Ok(()) => {
                    SessionStats::inc(&self.stats.events_written);
                    debug!(id = %status.id_str, "wrote status");
                }
                Err(e) => {
                    SessionStats::inc(&self.stats.write_failures);
                    warn!(id = %status.id_str, "write failed: {e}");
                }
            }
        }
        Control::Continue
    }
}

impl StreamHandler for FileListener {
    fn on_event(&mut self, raw: &str) -> Control {
        let elapsed = self.started_at.elapsed();
        let hour = chrono::Local::now().hour();
        self.on_event_at(raw, elapsed, hour)
    }

    fn on_error(&mut self, status: u16) -> Control {
        if RATE_LIMIT_STATUSES.contains(&status) {
            warn!(status, "stream rate limited, disconnecting");
            self.close(SessionState::Errored);
            return Control::Stop;
        }
        warn!(status, "stream connection rejected, will reconnect");
        Control::Continue
    }

    fn on_close(&mut self) {
        if self.file.is_some() {
            self.close(SessionState::Stopped);
        }
    }
}
