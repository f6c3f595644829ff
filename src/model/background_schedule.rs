use serde::{Deserialize, Serialize};

/// Per-entity configuration and progress for a multi-day background
/// backfill, driven by the scheduler's daily windowed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundSchedule {
    pub uid: String,
    pub entity_name: String,
    pub source_system: String,
    pub is_enabled: bool,
    pub sync_window_start: String,
    pub sync_window_end: String,
    pub days_to_complete: Option<i64>,
    pub rows_per_day: Option<i64>,
    pub total_rows_estimate: Option<i64>,
    pub current_offset: i64,
    pub last_run_at: Option<String>,
    pub next_run_at: Option<String>,
}

impl BackgroundSchedule {
    /// Invariant from §3: once an estimate is set, the offset never exceeds it.
    pub fn is_complete(&self) -> bool {
        match self.total_rows_estimate {
            Some(total) if total > 0 => self.current_offset >= total,
            _ => false,
        }
    }

    /// Rows to fetch on the next run: explicit `rows_per_day`, else an even
    /// split of the remaining estimate over the remaining days.
    pub fn next_slice_size(&self, default_rows_per_day: i64) -> i64 {
        if let Some(rows) = self.rows_per_day {
            return rows;
        }
        match (self.total_rows_estimate, self.days_to_complete) {
            (Some(total), Some(days)) if days > 0 => {
                let remaining = (total - self.current_offset).max(0);
                (remaining / days).max(1)
            }
            _ => default_rows_per_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BackgroundSchedule {
        BackgroundSchedule {
            uid: "u1".into(),
            entity_name: "inventory_items".into(),
            source_system: "erp".into(),
            is_enabled: true,
            sync_window_start: "19:00:00".into(),
            sync_window_end: "07:00:00".into(),
            days_to_complete: Some(5),
            rows_per_day: None,
            total_rows_estimate: Some(100_000),
            current_offset: 0,
            last_run_at: None,
            next_run_at: None,
        }
    }

    #[test]
    fn incomplete_until_offset_reaches_estimate() {
        let mut sched = sample();
        assert!(!sched.is_complete());
        sched.current_offset = 100_000;
        assert!(sched.is_complete());
    }

    #[test]
    fn slice_size_splits_remaining_over_remaining_days() {
        let sched = sample();
        assert_eq!(sched.next_slice_size(10_000), 20_000);
    }

    #[test]
    fn explicit_rows_per_day_overrides_split() {
        let mut sched = sample();
        sched.rows_per_day = Some(5_000);
        assert_eq!(sched.next_slice_size(10_000), 5_000);
    }
}
