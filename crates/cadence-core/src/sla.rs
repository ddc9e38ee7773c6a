//! SLA policy: severity → deadline offset.
//!
//! Applied exactly once, at ticket creation. `sla_due_at` is never
//! recomputed after it has been set.

use chrono::{DateTime, Duration, Utc};

use crate::activity::Severity;

/// Deadline offset in hours for a given severity.
pub fn sla_hours(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 1,
        Severity::High => 4,
        Severity::Medium => 8,
        Severity::Low => 24,
    }
}

/// The SLA deadline for a ticket created at `created_at`.
pub fn sla_due_at(created_at: DateTime<Utc>, severity: Severity) -> DateTime<Utc> {
    created_at + Duration::hours(i64::from(sla_hours(severity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hours_table() {
        assert_eq!(sla_hours(Severity::Critical), 1);
        assert_eq!(sla_hours(Severity::High), 4);
        assert_eq!(sla_hours(Severity::Medium), 8);
        assert_eq!(sla_hours(Severity::Low), 24);
    }

    #[test]
    fn due_at_adds_offset() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            sla_due_at(created, Severity::Critical),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            sla_due_at(created, Severity::Low),
            Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn default_severity_gets_24h_window() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(sla_hours(Severity::default()), 24);
        assert_eq!(
            sla_due_at(created, Severity::default()),
            created + Duration::hours(24)
        );
    }
}
