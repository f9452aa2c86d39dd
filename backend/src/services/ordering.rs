//! Job orderings, usable with `sort_by`.

use std::cmp::Ordering;

use crate::models::{LocalTime, SchedulerJob};

/// Higher score first.
pub fn decreasing_score(a: &SchedulerJob, b: &SchedulerJob) -> Ordering {
    b.score().cmp(&a.score())
}

/// Lower priority value first.
pub fn increasing_priority(a: &SchedulerJob, b: &SchedulerJob) -> Ordering {
    a.priority().cmp(&b.priority())
}

/// Setting targets first, then by altitude.
///
/// Among setting targets the lower one comes first, as it will be lost
/// sooner; among rising targets the higher one comes first. Without `when`,
/// the altitudes recorded at startup are compared.
pub fn decreasing_altitude(a: &SchedulerJob, b: &SchedulerJob, when: Option<LocalTime>) -> Ordering {
    let (alt_a, setting_a) = altitude_at(a, when);
    let (alt_b, setting_b) = altitude_at(b, when);

    match (setting_a, setting_b) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => alt_a.total_cmp(&alt_b),
        (false, false) => alt_b.total_cmp(&alt_a),
    }
}

/// Earlier startup first; jobs without a startup time go last.
pub fn increasing_startup_time(a: &SchedulerJob, b: &SchedulerJob) -> Ordering {
    match (a.startup_time(), b.startup_time()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn altitude_at(job: &SchedulerJob, when: Option<LocalTime>) -> (f64, bool) {
    match when {
        Some(time) => job.find_altitude(time),
        None => (job.altitude_at_startup(), job.is_setting_at_startup()),
    }
}
