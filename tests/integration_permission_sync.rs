//! Database-backed propagation tests. Run with a Postgres `DATABASE_URL` and
//! `cargo test -- --ignored`.

mod common;

use common::{
    FACULTY, HOD, allocate, create_batch, create_staff, create_subject, dept1, permissions,
    setup_college, wait_for_lock_waiters,
};
use lectern::modules::{BatchService, DepartmentService, FacultyService, PermissionSyncService};
use lectern_config::SyncConfig;
use lectern_core::ErrorKind;
use lectern_models::{CreateDepartmentDto, UpdateDepartmentDto};
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_department_populates_documents(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;

    assert_eq!(permissions(&pool, &c.staff1).await, dept1(&[("B1", HOD), ("B2", HOD)]));
    assert_eq!(permissions(&pool, &c.staff2).await, dept1(&[("B2", FACULTY)]));
    assert_eq!(
        permissions(&pool, &c.staff3).await,
        dept1(&[("B1", FACULTY), ("B2", FACULTY)])
    );

    let report = PermissionSyncService::reconcile(&pool, true).await.unwrap();
    assert!(report.is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_change_hod_transfers_grants(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;

    DepartmentService::change_hod(&pool, &c.config, c.department, c.staff2.clone())
        .await
        .unwrap();

    assert_eq!(permissions(&pool, &c.staff1).await, "{}");
    assert_eq!(permissions(&pool, &c.staff2).await, dept1(&[("B1", HOD), ("B2", HOD)]));
    assert_eq!(
        permissions(&pool, &c.staff3).await,
        dept1(&[("B1", FACULTY), ("B2", FACULTY)])
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_detach_batch_revokes_and_deletes_it(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;

    DepartmentService::detach_batches(&pool, &c.config, c.department, &[c.b2])
        .await
        .unwrap();

    assert_eq!(permissions(&pool, &c.staff1).await, dept1(&[("B1", HOD)]));
    assert_eq!(permissions(&pool, &c.staff2).await, "{}");
    assert_eq!(permissions(&pool, &c.staff3).await, dept1(&[("B1", FACULTY)]));

    let err = BatchService::get_batch(&pool, c.b2).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_lock_then_unlock_restores_documents(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    let before = [
        permissions(&pool, &c.staff1).await,
        permissions(&pool, &c.staff2).await,
        permissions(&pool, &c.staff3).await,
    ];

    let locked = DepartmentService::lock_department(&pool, &c.config, c.department)
        .await
        .unwrap();
    assert!(locked.locked);
    for staff in [&c.staff1, &c.staff2, &c.staff3] {
        assert_eq!(permissions(&pool, staff).await, "{}");
    }
    let owned = DepartmentService::list_owned_by(&pool, &c.staff1).await.unwrap();
    assert!(owned.is_empty());

    DepartmentService::unlock_department(&pool, &c.config, c.department)
        .await
        .unwrap();
    let after = [
        permissions(&pool, &c.staff1).await,
        permissions(&pool, &c.staff2).await,
        permissions(&pool, &c.staff3).await,
    ];
    assert_eq!(after, before);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_department_cascades(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;

    DepartmentService::delete_department(&pool, &c.config, c.department)
        .await
        .unwrap();

    for staff in [&c.staff1, &c.staff2, &c.staff3] {
        assert_eq!(permissions(&pool, staff).await, "{}");
    }
    for batch in [c.b1, c.b2] {
        assert!(BatchService::get_batch(&pool, batch).await.unwrap_err().is_not_found());
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_removing_one_of_two_allocations_keeps_entry(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    let extra = allocate(&pool, &c.staff2, "PHYS").await;
    BatchService::add_faculty(&pool, &c.config, c.b2, extra).await.unwrap();

    BatchService::remove_faculty(&pool, &c.config, c.b2, extra).await.unwrap();
    assert_eq!(permissions(&pool, &c.staff2).await, dept1(&[("B2", FACULTY)]));

    // Deleting the remaining allocation detaches it from B2 through the hook.
    let remaining = FacultyService::list_allocations(&pool, Some(&c.staff2))
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.subject_code == "MATH")
        .unwrap();
    FacultyService::delete_allocation(&pool, &c.config, remaining.id)
        .await
        .unwrap();
    assert_eq!(permissions(&pool, &c.staff2).await, "{}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_set_faculty_diffs_allocations(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    let staff4 = create_staff(&pool, "staff4@college.edu").await;
    let staff4_alloc = allocate(&pool, &staff4, "MATH").await;
    let staff3_alloc = allocate(&pool, &c.staff3, "MATH").await;

    BatchService::set_faculty(&pool, &c.config, c.b1, &[staff3_alloc, staff4_alloc])
        .await
        .unwrap();

    assert_eq!(permissions(&pool, &staff4).await, dept1(&[("B1", FACULTY)]));
    assert_eq!(
        permissions(&pool, &c.staff3).await,
        dept1(&[("B1", FACULTY), ("B2", FACULTY)])
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_batch_shared_by_two_departments(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    let staff4 = create_staff(&pool, "staff4@college.edu").await;

    DepartmentService::create_department(
        &pool,
        &c.config,
        CreateDepartmentDto {
            year: "2024-25".into(),
            semester: "5".into(),
            name: "DEPT_2".into(),
            hod_email: staff4.clone(),
            locked: false,
            batch_ids: vec![c.b1],
            branch_codes: Vec::new(),
        },
    )
    .await
    .unwrap();

    let both = format!(
        r#"{{"2024-25":{{"5":{{"DEPT_1":{{"B1":{FACULTY},"B2":{FACULTY}}},"DEPT_2":{{"B1":{FACULTY}}}}}}}}}"#
    );
    assert_eq!(permissions(&pool, &c.staff3).await, both);

    BatchService::delete_batch(&pool, &c.config, c.b1).await.unwrap();
    assert_eq!(permissions(&pool, &c.staff3).await, dept1(&[("B2", FACULTY)]));
    assert_eq!(permissions(&pool, &staff4).await, "{}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_batch_name_is_rejected(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    let duplicate = create_batch(&pool, &c.config, "B1", Vec::new()).await;

    let err = DepartmentService::attach_batches(&pool, &c.config, c.department, &[duplicate])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_scope_is_a_conflict(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;

    let err = DepartmentService::create_department(
        &pool,
        &c.config,
        CreateDepartmentDto {
            year: "2024-25".into(),
            semester: "5".into(),
            name: "DEPT_1".into(),
            hod_email: c.staff2.clone(),
            locked: false,
            batch_ids: Vec::new(),
            branch_codes: Vec::new(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

async fn corrupt(pool: &PgPool, staff: &lectern_models::Email) {
    sqlx::query(r#"UPDATE staff SET permissions = '"oops"'::jsonb WHERE email = $1"#)
        .bind(staff)
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_lenient_policy_keeps_structural_change(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    corrupt(&pool, &c.staff3).await;

    let department = DepartmentService::lock_department(&pool, &c.config, c.department)
        .await
        .unwrap();
    assert!(department.locked);

    // Only the malformed document is skipped; the others still converge.
    assert_eq!(permissions(&pool, &c.staff1).await, "{}");
    assert_eq!(permissions(&pool, &c.staff2).await, "{}");

    let report = PermissionSyncService::reconcile(&pool, false).await.unwrap();
    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.malformed[0].as_str(), "staff3@college.edu");
    assert!(report.drifted.is_empty());
    assert_eq!(report.rewritten, 1);

    for staff in [&c.staff1, &c.staff2, &c.staff3] {
        assert_eq!(permissions(&pool, staff).await, "{}");
    }
    assert!(PermissionSyncService::reconcile(&pool, true).await.unwrap().is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_strict_policy_aborts_structural_change(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::strict()).await;
    corrupt(&pool, &c.staff3).await;

    let err = DepartmentService::update_department(
        &pool,
        &c.config,
        c.department,
        UpdateDepartmentDto {
            locked: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);

    let department = DepartmentService::get_department(&pool, c.department)
        .await
        .unwrap();
    assert!(!department.department.locked);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_reconcile_dry_run_reports_without_writing(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    sqlx::query("UPDATE staff SET permissions = '{}'::jsonb WHERE email = $1")
        .bind(&c.staff2)
        .execute(&pool)
        .await
        .unwrap();

    let report = PermissionSyncService::reconcile(&pool, true).await.unwrap();
    assert_eq!(report.drifted.len(), 1);
    assert_eq!(report.drifted[0].staff.as_str(), "staff2@college.edu");
    assert_eq!(report.rewritten, 0);
    assert_eq!(permissions(&pool, &c.staff2).await, "{}");

    PermissionSyncService::reconcile(&pool, false).await.unwrap();
    assert_eq!(permissions(&pool, &c.staff2).await, dept1(&[("B2", FACULTY)]));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_malformed_document_does_not_block_other_staff(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    corrupt(&pool, &c.staff3).await;

    DepartmentService::detach_batches(&pool, &c.config, c.department, &[c.b2])
        .await
        .unwrap();

    assert_eq!(permissions(&pool, &c.staff1).await, dept1(&[("B1", HOD)]));
    assert_eq!(permissions(&pool, &c.staff2).await, "{}");

    let report = PermissionSyncService::reconcile(&pool, false).await.unwrap();
    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.rewritten, 1);
    assert_eq!(permissions(&pool, &c.staff3).await, dept1(&[("B1", FACULTY)]));
}

/// A faculty edit blocked behind the allocation row holds the batch lock
/// while a department attaches the same batch.
#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_faculty_added_during_attach_is_granted(pool: PgPool) {
    let config = SyncConfig::default();
    let hod = create_staff(&pool, "hod@college.edu").await;
    let late = create_staff(&pool, "late@college.edu").await;
    create_subject(&pool, "MATH").await;
    let late_alloc = allocate(&pool, &late, "MATH").await;
    let b1 = create_batch(&pool, &config, "B1", Vec::new()).await;
    let department = DepartmentService::create_department(
        &pool,
        &config,
        CreateDepartmentDto {
            year: "2024-25".into(),
            semester: "5".into(),
            name: "DEPT_1".into(),
            hod_email: hod.clone(),
            locked: false,
            batch_ids: Vec::new(),
            branch_codes: Vec::new(),
        },
    )
    .await
    .unwrap()
    .department
    .id;

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM faculty_allocations WHERE id = $1 FOR UPDATE")
        .bind(late_alloc)
        .execute(&mut *holder)
        .await
        .unwrap();

    let add = tokio::spawn({
        let pool = pool.clone();
        async move { BatchService::add_faculty(&pool, &config, b1, late_alloc).await }
    });
    wait_for_lock_waiters(&pool, 1).await;

    let attach = tokio::spawn({
        let pool = pool.clone();
        async move { DepartmentService::attach_batches(&pool, &config, department, &[b1]).await }
    });
    wait_for_lock_waiters(&pool, 2).await;

    holder.commit().await.unwrap();
    add.await.unwrap().unwrap();
    attach.await.unwrap().unwrap();

    assert_eq!(permissions(&pool, &late).await, dept1(&[("B1", FACULTY)]));
    assert_eq!(permissions(&pool, &hod).await, dept1(&[("B1", HOD)]));
    assert!(PermissionSyncService::reconcile(&pool, true).await.unwrap().is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_faculty_added_during_department_delete_is_revoked(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;
    let late = create_staff(&pool, "late@college.edu").await;
    let late_alloc = allocate(&pool, &late, "MATH").await;
    let config = c.config;
    let (b1, department) = (c.b1, c.department);

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM faculty_allocations WHERE id = $1 FOR UPDATE")
        .bind(late_alloc)
        .execute(&mut *holder)
        .await
        .unwrap();

    let add = tokio::spawn({
        let pool = pool.clone();
        async move { BatchService::add_faculty(&pool, &config, b1, late_alloc).await }
    });
    wait_for_lock_waiters(&pool, 1).await;

    let delete = tokio::spawn({
        let pool = pool.clone();
        async move { DepartmentService::delete_department(&pool, &config, department).await }
    });
    wait_for_lock_waiters(&pool, 2).await;

    holder.commit().await.unwrap();
    add.await.unwrap().unwrap();
    delete.await.unwrap().unwrap();

    for staff in [&c.staff1, &c.staff2, &c.staff3, &late] {
        assert_eq!(permissions(&pool, staff).await, "{}");
    }
    assert!(PermissionSyncService::reconcile(&pool, true).await.unwrap().is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_constraint_violations_are_conflicts(pool: PgPool) {
    let c = setup_college(&pool, SyncConfig::default()).await;

    let err = BatchService::set_students(&pool, c.b1, &["NO-SUCH-STUDENT".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let err = FacultyService::create_allocation(
        &pool,
        lectern_models::CreateAllocationDto {
            staff_email: common::email("ghost@college.edu"),
            subject_code: "MATH".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}
