#![allow(dead_code)]

use lectern::modules::{BatchService, DepartmentService, FacultyService, StaffService};
use lectern_config::SyncConfig;
use lectern_models::{
    AllocationId, BatchId, CreateAllocationDto, CreateBatchDto, CreateDepartmentDto,
    CreateStaffDto, CreateSubjectDto, DepartmentId, Email, StaffCategory,
};
use sqlx::PgPool;
use std::time::Duration;

pub const HOD: &str = r#"{"attendance":{"create":true,"read":true,"update":true,"delete":true},"test_result":{"create":true,"read":true,"update":true,"delete":true},"project":{"create":true,"read":true,"update":true,"delete":true},"mooc":{"create":true,"read":true,"update":true,"delete":true}}"#;
pub const FACULTY: &str = r#"{"attendance":{"create":true,"read":true,"update":false,"delete":false},"test_result":{"create":true,"read":true,"update":false,"delete":false},"project":{"create":true,"read":true,"update":true,"delete":false},"mooc":{"create":true,"read":true,"update":false,"delete":false}}"#;

/// Expected JSON of a document holding `batches` under 2024-25 / 5 / DEPT_1.
pub fn dept1(batches: &[(&str, &str)]) -> String {
    let leaves: Vec<String> = batches
        .iter()
        .map(|(batch, grants)| format!(r#""{batch}":{grants}"#))
        .collect();
    format!(r#"{{"2024-25":{{"5":{{"DEPT_1":{{{}}}}}}}}}"#, leaves.join(","))
}

pub fn email(value: &str) -> Email {
    Email::new(value).unwrap()
}

pub async fn create_staff(db: &PgPool, address: &str) -> Email {
    let initials: String = address.chars().filter(char::is_ascii_alphanumeric).take(5).collect();
    StaffService::create_staff(
        db,
        CreateStaffDto {
            email: email(address),
            first_name: "Test".into(),
            middle_name: None,
            last_name: "Staff".into(),
            short_name: initials,
            category: StaffCategory::Teaching,
            admin: false,
        },
    )
    .await
    .unwrap()
    .email
}

pub async fn create_subject(db: &PgPool, code: &str) {
    FacultyService::create_subject(
        db,
        CreateSubjectDto {
            code: code.into(),
            short_name: code.into(),
            full_name: format!("Subject {code}"),
        },
    )
    .await
    .unwrap();
}

pub async fn allocate(db: &PgPool, staff: &Email, subject: &str) -> AllocationId {
    FacultyService::create_allocation(
        db,
        CreateAllocationDto {
            staff_email: staff.clone(),
            subject_code: subject.into(),
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn create_batch(
    db: &PgPool,
    config: &SyncConfig,
    name: &str,
    allocation_ids: Vec<AllocationId>,
) -> BatchId {
    BatchService::create_batch(
        db,
        config,
        CreateBatchDto {
            name: name.into(),
            allocation_ids,
            students: Vec::new(),
            department_id: None,
        },
    )
    .await
    .unwrap()
    .batch
    .id
}

pub async fn permissions(db: &PgPool, staff: &Email) -> String {
    let document = StaffService::get_permissions(db, staff).await.unwrap();
    serde_json::to_string(&document).unwrap()
}

/// Waits until at least `count` sessions on the test database are blocked on a lock.
pub async fn wait_for_lock_waiters(db: &PgPool, count: i64) {
    for _ in 0..400 {
        let waiting = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM pg_stat_activity
               WHERE datname = current_database() AND wait_event_type = 'Lock'"#,
        )
        .fetch_one(db)
        .await
        .unwrap();
        if waiting >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {count} blocked sessions");
}

pub struct College {
    pub config: SyncConfig,
    pub department: DepartmentId,
    pub b1: BatchId,
    pub b2: BatchId,
    pub staff1: Email,
    pub staff2: Email,
    pub staff3: Email,
}

/// DEPT_1 (2024-25, semester 5), HOD staff1, unlocked.
/// B1 taught by staff3; B2 taught by staff2 and staff3.
pub async fn setup_college(db: &PgPool, config: SyncConfig) -> College {
    let staff1 = create_staff(db, "staff1@college.edu").await;
    let staff2 = create_staff(db, "staff2@college.edu").await;
    let staff3 = create_staff(db, "staff3@college.edu").await;
    create_subject(db, "MATH").await;
    create_subject(db, "PHYS").await;

    let b1_alloc = allocate(db, &staff3, "MATH").await;
    let b2_alloc_a = allocate(db, &staff2, "MATH").await;
    let b2_alloc_b = allocate(db, &staff3, "PHYS").await;

    let b1 = create_batch(db, &config, "B1", vec![b1_alloc]).await;
    let b2 = create_batch(db, &config, "B2", vec![b2_alloc_a, b2_alloc_b]).await;

    let department = DepartmentService::create_department(
        db,
        &config,
        CreateDepartmentDto {
            year: "2024-25".into(),
            semester: "5".into(),
            name: "DEPT_1".into(),
            hod_email: staff1.clone(),
            locked: false,
            batch_ids: vec![b1, b2],
            branch_codes: Vec::new(),
        },
    )
    .await
    .unwrap()
    .department
    .id;

    College {
        config,
        department,
        b1,
        b2,
        staff1,
        staff2,
        staff3,
    }
}
