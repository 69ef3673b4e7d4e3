//! Fake college data for local development.
//!
//! - [`staff`]: staff members and subjects, generated in parallel and bulk inserted
//! - [`structure`]: allocations, batches and departments created through the services
//! - [`models`]: seed records and [`SeedConfig`]
//!
//! Seeded staff use the `seed.lectern.test` email domain and seeded subjects
//! the `SEED` code prefix, which is how [`clear_seed`] finds them.

pub mod models;
pub mod staff;
pub mod structure;

pub use models::SeedConfig;

use lectern_config::SyncConfig;
use lectern_core::AppError;
use sqlx::PgPool;
use std::time::Instant;

pub const SEED_EMAIL_DOMAIN: &str = "seed.lectern.test";

pub async fn seed_all(db: &PgPool, sync: &SyncConfig, config: SeedConfig) -> Result<(), AppError> {
    let start_time = Instant::now();

    println!("🌱 Starting database seeding...");
    println!("   - Staff: {}, Subjects: {}", config.staff, config.subjects);
    println!(
        "   - Departments: {}, Batches per department: {}, Faculty per batch: {}",
        config.departments, config.batches_per_department, config.faculty_per_batch
    );

    let staff = staff::seed_staff(db, config.staff).await?;
    let subjects = staff::seed_subjects(db, config.subjects).await?;
    let departments = structure::seed_structure(db, sync, &config, &staff, &subjects).await?;

    println!(
        "\n✅ Seeding complete! Created {} staff, {} subjects, {} departments in {:?}",
        staff.len(),
        subjects.len(),
        departments.len(),
        start_time.elapsed()
    );
    Ok(())
}

pub async fn clear_seed(db: &PgPool, sync: &SyncConfig) -> Result<(), AppError> {
    let start_time = Instant::now();
    println!("🗑️  Clearing seeded data...");

    // Departments first so grants are revoked before their staff disappear.
    structure::clear_structure(db, sync).await?;
    staff::clear_staff_and_subjects(db).await?;

    println!("✅ Seeded data cleared in {:?}", start_time.elapsed());
    Ok(())
}
