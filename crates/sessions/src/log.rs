use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};

const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

struct StoredLine {
    line: String,
    bytes: usize,
}

/// Byte-capped buffer of timestamped log lines for one session.
///
/// Oldest lines are evicted once the cap is exceeded; the artifact notes how
/// many were dropped so downloads are never silently truncated.
pub struct LogBuffer {
    lines: VecDeque<StoredLine>,
    total_bytes: usize,
    max_bytes: usize,
    evicted: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_BYTES)
    }
}

impl LogBuffer {
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(64),
            total_bytes: 0,
            max_bytes: max_bytes.max(1),
            evicted: 0,
        }
    }

    pub fn append(&mut self, at: DateTime<Utc>, line: &str) {
        let stamped = format!("{} {}", at.to_rfc3339_opts(SecondsFormat::Millis, true), line);
        let bytes = stamped.len() + 1;

        while !self.lines.is_empty() && self.total_bytes.saturating_add(bytes) > self.max_bytes {
            if let Some(front) = self.lines.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(front.bytes);
                self.evicted += 1;
            }
        }

        self.lines.push_back(StoredLine {
            line: stamped,
            bytes,
        });
        self.total_bytes = self.total_bytes.saturating_add(bytes);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Materializes the buffer as a downloadable text artifact.
    pub fn artifact(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.total_bytes + 64);
        if self.evicted > 0 {
            out.push_str(&format!("({} earlier lines evicted)\n", self.evicted));
        }
        for stored in &self.lines {
            out.push_str(&stored.line);
            out.push('\n');
        }
        out.into_bytes()
    }
}
