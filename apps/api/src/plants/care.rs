//! Due-for-care rules.
//!
//! A plant is due for a kind of care when the matching sub-config is present
//! with a positive interval and it was either never done or the interval has
//! fully elapsed. The Postgres store expresses the same rules in SQL; the
//! functions here are the reference the in-memory store and the tests use.

use chrono::{DateTime, Duration, Months, Utc};

use crate::models::plant::Plant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CareKind {
    Watering,
    Fertilizing,
    Misting,
    Repotting,
}

/// The care schedule a plant has for `kind`: `(last done, interval)`.
/// `None` when the plant has no active schedule of that kind.
fn schedule(kind: CareKind, plant: &Plant) -> Option<(Option<DateTime<Utc>>, Interval)> {
    match kind {
        CareKind::Watering => plant
            .watering
            .as_ref()
            .filter(|w| w.interval_days > 0)
            .map(|w| (w.last_watered, Interval::Days(w.interval_days))),
        CareKind::Fertilizing => plant
            .fertilizing
            .as_ref()
            .filter(|f| f.interval_days > 0)
            .map(|f| (f.last_fertilized, Interval::Days(f.interval_days))),
        CareKind::Misting => plant
            .humidity
            .as_ref()
            .filter(|h| h.requires_misting && h.misting_interval_days > 0)
            .map(|h| (h.last_misted, Interval::Days(h.misting_interval_days))),
        CareKind::Repotting => plant
            .soil
            .as_ref()
            .filter(|s| s.repotting_cycle > 0)
            .map(|s| (s.last_repotted, Interval::Months(s.repotting_cycle))),
    }
}

#[derive(Debug, Clone, Copy)]
enum Interval {
    Days(i32),
    Months(i32),
}

impl Interval {
    fn after(self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Interval::Days(days) => start.checked_add_signed(Duration::days(i64::from(days))),
            Interval::Months(months) => {
                start.checked_add_months(Months::new(u32::try_from(months).ok()?))
            }
        }
    }
}

/// When care of `kind` next falls due. `Some(None)` means "now": the plant
/// has a schedule but it was never done.
pub fn next_due(kind: CareKind, plant: &Plant) -> Option<Option<DateTime<Utc>>> {
    let (last, interval) = schedule(kind, plant)?;
    match last {
        None => Some(None),
        Some(last) => interval.after(last).map(Some),
    }
}

pub fn is_due(kind: CareKind, plant: &Plant, now: DateTime<Utc>) -> bool {
    match next_due(kind, plant) {
        Some(None) => true,
        Some(Some(due)) => due <= now,
        None => false,
    }
}
