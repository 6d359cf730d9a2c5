use chrono::NaiveDate;
use std::collections::HashSet;
use tickertalk_core::{ContentItem, ThreadProgress};

/// Keep only items not yet persisted for this thread. The timestamp path
/// is always preferred when a low-water mark exists; the id-set fallback
/// fires only on first contact with a thread, where it is more expensive
/// but always correct.
pub fn filter_new_items(
    items: Vec<ContentItem>,
    low_water_mark: Option<i64>,
    existing_ids: &HashSet<String>,
) -> Vec<ContentItem> {
    match low_water_mark {
        Some(mark) => items
            .into_iter()
            .filter(|item| item.created_utc > mark)
            .collect(),
        None => items
            .into_iter()
            .filter(|item| !existing_ids.contains(&item.reddit_id))
            .collect(),
    }
}

/// Inclusive day sequence for a backfill range.
pub fn backfill_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}

/// Unix-second bounds [start, end) of one UTC day.
pub fn day_bounds_utc(day: NaiveDate) -> (i64, i64) {
    let start = day.and_hms_opt(0, 0, 0).expect("midnight").and_utc().timestamp();
    (start, start + 86_400)
}

/// A backfill day is skipped entirely (zero fetch calls) once every
/// thread already known for it is marked complete.
pub fn day_already_complete(known_threads: &[ThreadProgress]) -> bool {
    !known_threads.is_empty() && known_threads.iter().all(|t| t.is_complete)
}
