//! Per-site sliding window of accepted readings.
//!
//! Each site owns one `SiteWindow` holding at most `capacity` readings,
//! oldest first. Appending to a full window evicts the oldest reading. A gap
//! between consecutive readings larger than `max_gap` discards the history
//! and restarts accumulation from the new reading, because the risk model
//! assumes regular sampling.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::model::Reading;

/// Completeness of a window after an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Accumulating { len: usize, required: usize },
    Complete,
}

/// Result of `SiteWindow::append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub status: WindowStatus,
    /// Set when the append discarded history; the gap in seconds.
    pub gap_reset: Option<i64>,
}

/// Read-only, ordered copy of a site's window.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    readings: Vec<Reading>,
    required: usize,
    max_gap: Duration,
}

impl Window {
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    pub fn newest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Exactly `required` readings, strictly increasing, no gap above max.
    pub fn is_complete(&self) -> bool {
        self.readings.len() == self.required && self.is_regular()
    }

    /// Every consecutive pair is strictly ordered and within `max_gap`.
    pub fn is_regular(&self) -> bool {
        self.readings.windows(2).all(|pair| {
            let gap = pair[1].timestamp - pair[0].timestamp;
            gap > Duration::zero() && gap <= self.max_gap
        })
    }
}

#[derive(Debug, Clone)]
pub struct SiteWindow {
    capacity: usize,
    max_gap: Duration,
    readings: VecDeque<Reading>,
}

impl SiteWindow {
    pub fn new(capacity: usize, max_gap_secs: i64) -> Self {
        Self {
            capacity,
            max_gap: Duration::seconds(max_gap_secs),
            readings: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Appends an accepted reading, evicting the oldest when full.
    pub fn append(&mut self, reading: Reading) -> Appended {
        let mut gap_reset = None;
        if let Some(last) = self.readings.back() {
            let gap = reading.timestamp - last.timestamp;
            if gap > self.max_gap {
                self.readings.clear();
                gap_reset = Some(gap.num_seconds());
            }
        }

        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }

        Appended {
            status: self.status(),
            gap_reset,
        }
    }

    pub fn status(&self) -> WindowStatus {
        if self.readings.len() >= self.capacity {
            WindowStatus::Complete
        } else {
            WindowStatus::Accumulating {
                len: self.readings.len(),
                required: self.capacity,
            }
        }
    }

    pub fn snapshot(&self) -> Window {
        Window {
            readings: self.readings.iter().cloned().collect(),
            required: self.capacity,
            max_gap: self.max_gap,
        }
    }

    /// Discards all history.
    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.readings.back().map(|r| r.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
