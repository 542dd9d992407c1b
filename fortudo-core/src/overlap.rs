//! Overlap detection on half-open ranges of absolute instants.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Half-open `[start, end)` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }
}

/// Back-to-back ranges (`a.end == b.start`) do not overlap.
pub fn overlaps(a: &TimeRange, b: &TimeRange) -> bool {
    a.start < b.end && b.start < a.end
}

/// Incomplete scheduled tasks whose range overlaps `range`, in store order.
///
/// Locked and editing tasks are reported too: they still occupy the slot even
/// though a cascade will not move them.
pub fn find_conflicts<'a>(
    range: &TimeRange,
    tasks: &'a [Task],
    exclude_id: Option<&str>,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| Some(t.id.as_str()) != exclude_id)
        .filter(|t| !t.is_completed())
        .filter(|t| t.range().is_some_and(|r| overlaps(range, &r)))
        .collect()
}

/// Human-readable warning for a non-empty conflict list.
pub fn overlap_warning(conflicts: &[&Task]) -> Option<String> {
    if conflicts.is_empty() {
        return None;
    }
    let names: Vec<&str> = conflicts.iter().map(|t| t.description.as_str()).collect();
    Some(format!("Overlaps with: {}", names.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let a = TimeRange::new(at(17, 10, 0), at(17, 11, 0));
        let b = TimeRange::new(at(17, 11, 0), at(17, 12, 0));
        assert!(!overlaps(&a, &b));
        assert!(!overlaps(&b, &a));
    }

    #[test]
    fn midnight_crossing_ranges_overlap() {
        let late = TimeRange::new(at(17, 23, 0), at(18, 0, 30));
        let early = TimeRange::new(at(18, 0, 15), at(18, 1, 0));
        assert!(overlaps(&late, &early));
    }

    #[test]
    fn contained_range_overlaps() {
        let outer = TimeRange::new(at(17, 9, 0), at(17, 12, 0));
        let inner = TimeRange::new(at(17, 10, 0), at(17, 10, 30));
        assert!(overlaps(&outer, &inner));
    }

    #[test]
    fn conflicts_skip_completed_and_excluded() {
        let tasks = vec![
            Task::scheduled("a", "Morning focus", at(17, 9, 0), 60),
            Task::scheduled("b", "Done thing", at(17, 9, 0), 60).with_status(TaskStatus::Completed),
            Task::scheduled("c", "Pinned", at(17, 9, 30), 30).with_locked(true),
            Task::scheduled("d", "Later", at(17, 11, 0), 30),
        ];
        let slot = TimeRange::new(at(17, 9, 15), at(17, 10, 15));

        let hits = find_conflicts(&slot, &tasks, None);
        let ids: Vec<&str> = hits.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(
            overlap_warning(&hits).unwrap(),
            "Overlaps with: Morning focus, Pinned"
        );

        let hits = find_conflicts(&slot, &tasks, Some("a"));
        assert_eq!(hits.len(), 1);
        assert!(overlap_warning(&[]).is_none());
    }

    fn range_strategy() -> impl Strategy<Value = TimeRange> {
        (0i64..2880, 1i64..600).prop_map(|(start, len)| {
            let base = at(17, 0, 0);
            TimeRange::new(
                base + Duration::minutes(start),
                base + Duration::minutes(start + len),
            )
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in range_strategy(), b in range_strategy()) {
            prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
        }

        #[test]
        fn range_overlaps_itself(a in range_strategy()) {
            prop_assert!(overlaps(&a, &a));
        }

        #[test]
        fn adjacent_ranges_never_overlap(a in range_strategy(), len in 1i64..600) {
            let next = TimeRange::new(a.end, a.end + Duration::minutes(len));
            prop_assert!(!overlaps(&a, &next));
        }
    }
}
