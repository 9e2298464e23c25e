use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::logger::append_line;
use crate::time::{now_stamp, parse_tz};

/// Human-readable audit trail. Every pipeline and monitor step goes through
/// here: always as a tracing event (target `audit`), and additionally as a
/// timestamped line in `FLASH_TRADE_LOG` when configured.
#[derive(Clone)]
pub struct Journal {
    inner: Arc<Inner>,
}

struct Inner {
    path: Option<PathBuf>,
    tz: chrono_tz::Tz,
}

impl Journal {
    pub fn new(path: Option<impl Into<PathBuf>>, tz: &str) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                path: path.map(Into::into),
                tz: parse_tz(tz)?,
            }),
        })
    }

    /// Tracing only.
    pub fn tracing_only() -> Self {
        Self {
            inner: Arc::new(Inner { path: None, tz: chrono_tz::UTC }),
        }
    }

    pub fn record(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        info!(target: "audit", "{line}");
        self.append(line);
    }

    pub fn record_warn(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        warn!(target: "audit", "{line}");
        self.append(line);
    }

    fn append(&self, line: &str) {
        let Some(path) = self.inner.path.as_ref() else {
            return;
        };
        let stamped = format!("[{}] {}", now_stamp(self.inner.tz), line);
        if let Err(e) = append_line(path, &stamped) {
            warn!(error = %e, path = %path.display(), "journal.append_failed");
        }
    }
}
