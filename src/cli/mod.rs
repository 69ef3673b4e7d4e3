pub mod seeder;

use crate::modules::permissions::ReconcileReport;

/// Human-readable summary of a reconciliation run.
pub fn render_reconcile_report(report: &ReconcileReport) -> String {
    let mut out = String::new();

    if report.is_consistent() {
        out.push_str(&format!(
            "✅ All {} permission documents match the college structure\n",
            report.staff_checked
        ));
        return out;
    }

    out.push_str(&format!(
        "⚠️  {} of {} staff members have drifted permission documents\n",
        report.drifted.len() + report.malformed.len(),
        report.staff_checked
    ));

    for staff in &report.malformed {
        out.push_str(&format!("   - {staff}: stored document is malformed\n"));
    }
    for drift in &report.drifted {
        out.push_str(&format!("   - {}\n", drift.staff));
        for path in drift.unexpected_paths() {
            out.push_str(&format!("       unexpected {path}\n"));
        }
        for path in drift.missing_paths() {
            out.push_str(&format!("       missing    {path}\n"));
        }
    }

    if report.dry_run {
        out.push_str("🔎 Dry run, nothing was written\n");
    } else {
        out.push_str(&format!("🔧 Rewrote {} documents\n", report.rewritten));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_permissions::{Drift, PermissionDocument, ScopePath, ScopeRole, StaffHandle};

    #[test]
    fn test_consistent_report() {
        let report = ReconcileReport {
            staff_checked: 3,
            ..Default::default()
        };
        assert_eq!(
            render_reconcile_report(&report),
            "✅ All 3 permission documents match the college structure\n"
        );
    }

    #[test]
    fn test_drift_report_lists_paths() {
        let path = ScopePath::new("2024-25", "5", "DEPT_1", "B1");
        let mut expected = PermissionDocument::new();
        expected.assign(&path, ScopeRole::Faculty.grants());

        let report = ReconcileReport {
            staff_checked: 2,
            drifted: vec![Drift {
                staff: StaffHandle::new("staff2@college.edu"),
                stored: PermissionDocument::new(),
                expected,
            }],
            malformed: vec![StaffHandle::new("staff3@college.edu")],
            rewritten: 0,
            dry_run: true,
        };

        let rendered = render_reconcile_report(&report);
        assert!(rendered.contains("2 of 2 staff members"));
        assert!(rendered.contains("staff3@college.edu: stored document is malformed"));
        assert!(rendered.contains(&format!("missing    {path}")));
        assert!(rendered.ends_with("Dry run, nothing was written\n"));
    }
}
