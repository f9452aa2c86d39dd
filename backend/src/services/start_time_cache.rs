//! Per-job memo of start-time searches.
//!
//! Each entry records that a search over `[from, until)` found `result`
//! (or nothing). A later search starting inside a recorded window either
//! reuses the answer or resumes from the end of the window.

use chrono::Duration;
use serde::Serialize;

use crate::models::LocalTime;

/// Entries kept before the cache is flushed.
pub const MAX_ENTRIES: usize = 10;

/// Longest window a single entry may cover.
pub const MAX_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartTimeEntry {
    pub from: LocalTime,
    pub until: LocalTime,
    pub result: Option<LocalTime>,
}

/// Answer of [`StartTimeCache::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// No recorded window covers the query.
    Miss,
    /// The recorded answer applies as is.
    Hit(Option<LocalTime>),
    /// Nothing found up to this instant; search on from here.
    Resume(LocalTime),
}

#[derive(Debug, Clone, Default)]
pub struct StartTimeCache {
    entries: Vec<StartTimeEntry>,
}

impl StartTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[StartTimeEntry] {
        &self.entries
    }

    /// Look up a search starting at `from` and bounded by `until`.
    pub fn lookup(&self, from: LocalTime, until: Option<LocalTime>) -> CacheLookup {
        let until = Self::effective_until(from, until);

        let covering = self.entries.iter().find(|entry| {
            from >= entry.from
                && from < entry.until
                && entry.result.map_or(true, |result| from < result)
        });

        match covering {
            None => CacheLookup::Miss,
            Some(entry) if entry.result.is_some() || until <= entry.until => {
                CacheLookup::Hit(entry.result)
            }
            Some(entry) => CacheLookup::Resume(entry.until),
        }
    }

    /// Record the result of a search over `[from, until)`.
    pub fn store(&mut self, from: LocalTime, until: Option<LocalTime>, result: Option<LocalTime>) {
        if self.entries.len() > MAX_ENTRIES {
            log::trace!("Flushing {} start-time entries", self.entries.len());
            self.entries.clear();
        }
        self.entries.push(StartTimeEntry {
            from,
            until: Self::effective_until(from, until),
            result,
        });
    }

    fn effective_until(from: LocalTime, until: Option<LocalTime>) -> LocalTime {
        let horizon = from + Duration::hours(MAX_WINDOW_HOURS);
        until.map_or(horizon, |until| until.min(horizon))
    }
}
