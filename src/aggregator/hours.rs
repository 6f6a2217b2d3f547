use crate::wire::HourCount;
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

/// Business hours as `[start, end)` in a fixed local offset. `start > end`
/// wraps midnight; `start == end` means there are no out-of-hours.
#[derive(Debug, Clone, Copy)]
pub struct BusinessHours {
    start: u32,
    end: u32,
    offset: FixedOffset,
}

impl BusinessHours {
    pub fn new(start: u32, end: u32, utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { start, end, offset }
    }

    pub fn local_hour(&self, ts_ms: u64) -> Option<u32> {
        DateTime::from_timestamp_millis(ts_ms as i64).map(|dt| dt.with_timezone(&self.offset).hour())
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            (self.start..self.end).contains(&hour)
        } else {
            hour >= self.start || hour < self.end
        }
    }

    pub fn is_out_of_hours(&self, ts_ms: u64) -> Option<u32> {
        self.local_hour(ts_ms).filter(|hour| !self.contains(*hour))
    }
}

/// Request totals per local hour of day, outside business hours only.
#[derive(Debug, Clone, Default)]
pub struct OutOfHoursProfile {
    by_hour: [u64; 24],
}

impl OutOfHoursProfile {
    pub fn add(&mut self, hour: u32, count: u64) {
        if let Some(slot) = self.by_hour.get_mut(hour as usize) {
            *slot = slot.saturating_add(count);
        }
    }

    pub fn get(&self, hour: u32) -> u64 {
        self.by_hour.get(hour as usize).copied().unwrap_or(0)
    }

    /// Non-empty hours, busiest first.
    pub fn ranking(&self) -> Vec<HourCount> {
        let mut hours: Vec<HourCount> = self
            .by_hour
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(hour, count)| HourCount {
                hour: hour as u32,
                count: *count,
            })
            .collect();
        hours.sort_by(|a, b| b.count.cmp(&a.count).then(a.hour.cmp(&b.hour)));
        hours
    }
}
