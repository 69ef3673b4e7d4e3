//! End-to-end propagation scenarios over the in-memory college, asserted on
//! the exact stored JSON.

use lectern_permissions::{College, DepartmentChanges, DepartmentScope, StaffHandle};
use uuid::Uuid;

const HOD: &str = r#"{"attendance":{"create":true,"read":true,"update":true,"delete":true},"test_result":{"create":true,"read":true,"update":true,"delete":true},"project":{"create":true,"read":true,"update":true,"delete":true},"mooc":{"create":true,"read":true,"update":true,"delete":true}}"#;
const FACULTY: &str = r#"{"attendance":{"create":true,"read":true,"update":false,"delete":false},"test_result":{"create":true,"read":true,"update":false,"delete":false},"project":{"create":true,"read":true,"update":true,"delete":false},"mooc":{"create":true,"read":true,"update":false,"delete":false}}"#;

struct Fixture {
    college: College,
    department: Uuid,
    b1: Uuid,
    b2: Uuid,
    staff1: StaffHandle,
    staff2: StaffHandle,
    staff3: StaffHandle,
}

impl Fixture {
    fn json(&self, staff: &StaffHandle) -> String {
        let document = self.college.document(staff).expect("staff member exists");
        serde_json::to_string(document).expect("document serializes")
    }

    fn assert_consistent(&self) {
        let drift = self.college.drift();
        assert!(drift.is_empty(), "documents drifted: {drift:?}");
    }
}

/// DEPT_1 (2024-25, semester 5), HOD staff1, unlocked.
/// B1 taught by staff3; B2 taught by staff2 and staff3.
fn setup() -> Fixture {
    let mut college = College::new();
    let staff1 = college.add_staff("staff1@college.edu");
    let staff2 = college.add_staff("staff2@college.edu");
    let staff3 = college.add_staff("staff3@college.edu");

    let b1 = college.create_batch("B1", [staff3.clone()]).unwrap();
    let b2 = college
        .create_batch("B2", [staff2.clone(), staff3.clone()])
        .unwrap();
    let department = college
        .create_department(
            DepartmentScope::new("2024-25", "5", "DEPT_1"),
            staff1.clone(),
            false,
            &[b1, b2],
        )
        .unwrap();

    Fixture {
        college,
        department,
        b1,
        b2,
        staff1,
        staff2,
        staff3,
    }
}

fn scope(batches: &[(&str, &str)]) -> String {
    let leaves: Vec<String> = batches
        .iter()
        .map(|(batch, grants)| format!(r#""{batch}":{grants}"#))
        .collect();
    format!(r#"{{"2024-25":{{"5":{{"DEPT_1":{{{}}}}}}}}}"#, leaves.join(","))
}

#[test]
fn test_create_unlocked_department_populates_documents() {
    let f = setup();

    assert_eq!(f.json(&f.staff1), scope(&[("B1", HOD), ("B2", HOD)]));
    assert_eq!(f.json(&f.staff2), scope(&[("B2", FACULTY)]));
    assert_eq!(f.json(&f.staff3), scope(&[("B1", FACULTY), ("B2", FACULTY)]));
    f.assert_consistent();
}

#[test]
fn test_hod_change_transfers_grants() {
    let mut f = setup();
    f.college.set_hod(f.department, f.staff2.clone()).unwrap();

    assert_eq!(f.json(&f.staff1), "{}");
    assert_eq!(f.json(&f.staff2), scope(&[("B1", HOD), ("B2", HOD)]));
    assert_eq!(f.json(&f.staff3), scope(&[("B1", FACULTY), ("B2", FACULTY)]));
    f.assert_consistent();
}

#[test]
fn test_hod_change_downgrades_old_hod_where_still_teaching() {
    let mut f = setup();
    f.college.add_allocation(f.b2, f.staff1.clone()).unwrap();
    assert_eq!(f.json(&f.staff1), scope(&[("B1", HOD), ("B2", HOD)]));

    f.college.set_hod(f.department, f.staff3.clone()).unwrap();

    assert_eq!(f.json(&f.staff1), scope(&[("B2", FACULTY)]));
    assert_eq!(f.json(&f.staff3), scope(&[("B1", HOD), ("B2", HOD)]));
    f.assert_consistent();
}

#[test]
fn test_removing_batch_revokes_its_entries_and_deletes_it() {
    let mut f = setup();
    f.college.detach_batches(f.department, &[f.b2]).unwrap();

    assert_eq!(f.json(&f.staff1), scope(&[("B1", HOD)]));
    assert_eq!(f.json(&f.staff2), "{}");
    assert_eq!(f.json(&f.staff3), scope(&[("B1", FACULTY)]));
    assert_eq!(f.college.batch_ids(), vec![f.b1]);
    f.assert_consistent();
}

#[test]
fn test_lock_clears_and_unlock_restores() {
    let mut f = setup();
    let before: Vec<String> = [&f.staff1, &f.staff2, &f.staff3]
        .into_iter()
        .map(|s| f.json(s))
        .collect();

    f.college.set_locked(f.department, true).unwrap();
    for staff in [&f.staff1, &f.staff2, &f.staff3] {
        assert_eq!(f.json(staff), "{}");
    }
    f.assert_consistent();

    f.college.set_locked(f.department, false).unwrap();
    let after: Vec<String> = [&f.staff1, &f.staff2, &f.staff3]
        .into_iter()
        .map(|s| f.json(s))
        .collect();
    assert_eq!(after, before);
}

#[test]
fn test_delete_department_removes_scope_and_batches() {
    let mut f = setup();
    f.college.delete_department(f.department).unwrap();

    for staff in [&f.staff1, &f.staff2, &f.staff3] {
        assert_eq!(f.json(staff), "{}");
    }
    assert!(f.college.batch_ids().is_empty());
    assert!(f.college.department_ids().is_empty());
}

#[test]
fn test_delete_batch_keeps_sibling_entries() {
    let mut f = setup();
    f.college.delete_batch(f.b1).unwrap();

    assert_eq!(f.json(&f.staff1), scope(&[("B2", HOD)]));
    assert_eq!(f.json(&f.staff2), scope(&[("B2", FACULTY)]));
    assert_eq!(f.json(&f.staff3), scope(&[("B2", FACULTY)]));
    f.assert_consistent();
}

#[test]
fn test_locked_department_ignores_structural_changes_until_unlocked() {
    let mut f = setup();
    f.college.set_locked(f.department, true).unwrap();

    let staff4 = f.college.add_staff("staff4@college.edu");
    let b3 = f.college.create_batch("B3", [staff4.clone()]).unwrap();
    f.college.attach_batches(f.department, &[b3]).unwrap();
    f.college.add_allocation(f.b1, f.staff2.clone()).unwrap();
    f.college.set_hod(f.department, f.staff3.clone()).unwrap();

    for staff in [&f.staff1, &f.staff2, &f.staff3, &staff4] {
        assert_eq!(f.json(staff), "{}");
    }

    f.college.set_locked(f.department, false).unwrap();
    assert_eq!(f.json(&f.staff1), "{}");
    assert_eq!(f.json(&f.staff2), scope(&[("B1", FACULTY), ("B2", FACULTY)]));
    assert_eq!(f.json(&f.staff3), scope(&[("B1", HOD), ("B2", HOD), ("B3", HOD)]));
    assert_eq!(f.json(&staff4), scope(&[("B3", FACULTY)]));
    f.assert_consistent();
}

#[test]
fn test_rescope_moves_entries() {
    let mut f = setup();
    f.college
        .update_department(
            f.department,
            DepartmentChanges {
                scope: Some(DepartmentScope::new("2024-25", "6", "DEPT_1")),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(
        f.json(&f.staff2),
        format!(r#"{{"2024-25":{{"6":{{"DEPT_1":{{"B2":{FACULTY}}}}}}}}}"#)
    );
    f.assert_consistent();
}

#[test]
fn test_batch_shared_by_two_departments() {
    let mut f = setup();
    let staff4 = f.college.add_staff("staff4@college.edu");
    let other = f
        .college
        .create_department(
            DepartmentScope::new("2024-25", "5", "DEPT_2"),
            staff4.clone(),
            false,
            &[f.b1],
        )
        .unwrap();

    let dept2_b1 = |grants: &str| {
        format!(r#""DEPT_2":{{"B1":{grants}}}"#)
    };
    assert_eq!(
        f.json(&f.staff3),
        format!(
            r#"{{"2024-25":{{"5":{{"DEPT_1":{{"B1":{FACULTY},"B2":{FACULTY}}},{}}}}}}}"#,
            dept2_b1(FACULTY)
        )
    );

    // Faculty changes reach both departments.
    f.college.add_allocation(f.b1, f.staff2.clone()).unwrap();
    assert_eq!(
        f.json(&f.staff2),
        format!(
            r#"{{"2024-25":{{"5":{{"DEPT_1":{{"B1":{FACULTY},"B2":{FACULTY}}},{}}}}}}}"#,
            dept2_b1(FACULTY)
        )
    );
    f.assert_consistent();

    // Locking one department leaves the other's entries alone.
    f.college.set_locked(other, true).unwrap();
    assert_eq!(f.json(&f.staff3), scope(&[("B1", FACULTY), ("B2", FACULTY)]));
    assert_eq!(f.json(&staff4), "{}");
    f.assert_consistent();

    f.college.set_locked(other, false).unwrap();
    f.college.delete_batch(f.b1).unwrap();
    assert_eq!(f.json(&f.staff3), scope(&[("B2", FACULTY)]));
    assert_eq!(f.json(&staff4), "{}");
    f.assert_consistent();
}

#[test]
fn test_faculty_removal_spares_hod_entry() {
    let mut f = setup();
    let allocation = f.college.add_allocation(f.b1, f.staff1.clone()).unwrap();
    f.college.remove_allocation(f.b1, allocation).unwrap();

    assert_eq!(f.json(&f.staff1), scope(&[("B1", HOD), ("B2", HOD)]));
    f.assert_consistent();
}
