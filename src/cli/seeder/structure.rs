use fake::Fake;
use lectern_config::SyncConfig;
use lectern_core::AppError;
use lectern_models::{
    AllocationId, CreateAllocationDto, CreateBatchDto, CreateDepartmentDto, DepartmentId, Email,
};
use sqlx::PgPool;
use std::time::Instant;

use super::SEED_EMAIL_DOMAIN;
use super::models::SeedConfig;
use crate::modules::batches::BatchService;
use crate::modules::departments::DepartmentService;
use crate::modules::faculty::FacultyService;

const BATCH_NAMES: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];

pub fn batch_name(idx: usize) -> String {
    BATCH_NAMES
        .get(idx)
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("B{}", idx + 1))
}

/// Semesters cycle 1..=8 so department scopes stay unique by name.
pub fn department_scope(config: &SeedConfig, idx: usize) -> (String, String, String) {
    (
        config.year.clone(),
        ((idx % 8) + 1).to_string(),
        format!("SEED_{}", idx + 1),
    )
}

/// Creates batches with random allocations, then departments that attach them,
/// so documents are written by the regular propagation hooks.
pub async fn seed_structure(
    db: &PgPool,
    sync: &SyncConfig,
    config: &SeedConfig,
    staff: &[String],
    subjects: &[String],
) -> Result<Vec<DepartmentId>, AppError> {
    if staff.is_empty() || subjects.is_empty() {
        println!("   ⚠️  No staff or subjects to allocate, skipping departments");
        return Ok(Vec::new());
    }

    let start_time = Instant::now();
    println!(
        "🏛️  Seeding {} departments with {} batches each...",
        config.departments, config.batches_per_department
    );

    let mut department_ids = Vec::with_capacity(config.departments);
    for idx in 0..config.departments {
        let mut batch_ids = Vec::with_capacity(config.batches_per_department);
        for batch_idx in 0..config.batches_per_department {
            let mut allocation_ids = Vec::with_capacity(config.faculty_per_batch);
            for _ in 0..config.faculty_per_batch {
                allocation_ids.push(random_allocation(db, staff, subjects).await?);
            }

            let batch = BatchService::create_batch(
                db,
                sync,
                CreateBatchDto {
                    name: batch_name(batch_idx),
                    allocation_ids,
                    students: Vec::new(),
                    department_id: None,
                },
            )
            .await?;
            batch_ids.push(batch.batch.id);
        }

        let (year, semester, name) = department_scope(config, idx);
        let hod = Email::new(&staff[(0..staff.len()).fake::<usize>()])?;
        let department = DepartmentService::create_department(
            db,
            sync,
            CreateDepartmentDto {
                year,
                semester,
                name,
                hod_email: hod,
                locked: false,
                batch_ids,
                branch_codes: Vec::new(),
            },
        )
        .await?;
        department_ids.push(department.department.id);
    }

    println!(
        "   ✓ Created {} departments and {} batches in {:?}",
        department_ids.len(),
        config.total_batches(),
        start_time.elapsed()
    );
    Ok(department_ids)
}

async fn random_allocation(
    db: &PgPool,
    staff: &[String],
    subjects: &[String],
) -> Result<AllocationId, AppError> {
    let staff_email = Email::new(&staff[(0..staff.len()).fake::<usize>()])?;
    let subject_code = subjects[(0..subjects.len()).fake::<usize>()].clone();

    let allocation = FacultyService::create_allocation(
        db,
        CreateAllocationDto {
            staff_email,
            subject_code,
        },
    )
    .await?;
    Ok(allocation.id)
}

/// Deletes seeded departments through the service so their grants are revoked.
pub async fn clear_structure(db: &PgPool, sync: &SyncConfig) -> Result<usize, AppError> {
    let ids = sqlx::query_scalar::<_, DepartmentId>(
        "SELECT id FROM departments WHERE hod_email LIKE '%@' || $1 OR name LIKE 'SEED\\_%'",
    )
    .bind(SEED_EMAIL_DOMAIN)
    .fetch_all(db)
    .await?;

    for id in &ids {
        DepartmentService::delete_department(db, sync, *id).await?;
    }

    println!("   ✓ Deleted {} departments", ids.len());
    Ok(ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_names_fit_column() {
        assert_eq!(batch_name(0), "A");
        assert_eq!(batch_name(9), "J");
        assert_eq!(batch_name(10), "B11");
        assert!(batch_name(999_999).len() <= 10);
    }

    #[test]
    fn test_department_scopes_are_unique() {
        let config = SeedConfig::default();
        let scopes: std::collections::BTreeSet<_> =
            (0..20).map(|i| department_scope(&config, i)).collect();
        assert_eq!(scopes.len(), 20);
        assert!(scopes.iter().all(|(_, semester, name)| semester.len() == 1 && name.len() <= 20));
    }
}
