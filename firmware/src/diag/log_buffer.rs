//! Per-boot ring buffer of recent log lines (grounded in
//! `m4g_logging.c`'s stage buffer + `m4g_log_dump_and_clear`): lines are
//! appended as they're logged, oldest ones drop once the buffer is full,
//! and the whole thing can be dumped (e.g. at the start of the next boot)
//! and cleared.

use std::collections::VecDeque;

/// Bounded, overwrite-oldest buffer of log lines collected during a boot.
#[derive(Debug)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    /// Builds an empty buffer holding at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Appends `line`, dropping the oldest entry first if already full.
    pub fn append(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Current number of buffered lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the buffer holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterates buffered lines oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Joins all buffered lines with `\n`, for handing to a persistence
    /// sink in one write.
    #[must_use]
    pub fn join(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// Removes every buffered line, returning them joined as
    /// [`Self::join`] would.
    pub fn take(&mut self) -> String {
        let joined = self.join();
        self.lines.clear();
        joined
    }
}
