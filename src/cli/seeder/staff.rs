use fake::Fake;
use fake::faker::company::en::Industry;
use fake::faker::name::en::{FirstName, LastName};
use lectern_core::AppError;
use rayon::prelude::*;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Instant;

use super::SEED_EMAIL_DOMAIN;
use super::models::{StaffSeed, SubjectSeed};

const BATCH_SIZE: usize = 500;

fn clean(value: &str, max: usize, fallback: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(char::is_ascii_alphabetic)
        .take(max)
        .collect();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// Generates staff in parallel. Every tenth member is non-teaching.
pub fn generate_staff(count: usize) -> Vec<StaffSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| {
            let first: String = FirstName().fake();
            let last: String = LastName().fake();
            let first_name = clean(&first, 20, "Staff");
            let last_name = clean(&last, 20, "Member");

            let initials: String = first_name
                .chars()
                .take(1)
                .chain(last_name.chars().take(1))
                .collect();

            StaffSeed {
                email: format!(
                    "{}.{}{}@{}",
                    first_name.to_lowercase(),
                    last_name.to_lowercase(),
                    idx,
                    SEED_EMAIL_DOMAIN
                ),
                short_name: format!("{}{}", initials.to_uppercase(), idx % 1000),
                first_name,
                last_name,
                category: if idx % 10 == 9 { "NT" } else { "T" },
            }
        })
        .collect()
}

pub fn generate_subjects(count: usize) -> Vec<SubjectSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| {
            let industry: String = Industry().fake();
            SubjectSeed {
                code: format!("SEED{:04}", idx + 1),
                short_name: format!("SUB{}", idx + 1),
                full_name: industry.chars().take(50).collect(),
            }
        })
        .collect()
}

pub async fn seed_staff(db: &PgPool, count: usize) -> Result<Vec<String>, AppError> {
    let start_time = Instant::now();
    println!("👩‍🏫 Seeding {} staff members...", count);

    let staff = generate_staff(count);
    let mut tx = db.begin().await?;
    let mut emails = Vec::with_capacity(staff.len());
    for chunk in staff.chunks(BATCH_SIZE) {
        emails.extend(insert_staff_chunk(&mut tx, chunk).await?);
    }
    tx.commit().await?;

    println!(
        "   ✓ Inserted {} staff members in {:?}",
        emails.len(),
        start_time.elapsed()
    );
    Ok(emails)
}

async fn insert_staff_chunk(
    tx: &mut Transaction<'_, Postgres>,
    staff: &[StaffSeed],
) -> Result<Vec<String>, AppError> {
    if staff.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = String::from(
        "INSERT INTO staff (email, first_name, last_name, short_name, category) VALUES ",
    );
    for i in 0..staff.len() {
        if i > 0 {
            query.push_str(", ");
        }
        let p = i * 5;
        query.push_str(&format!(
            "(${}, ${}, ${}, ${}, ${})",
            p + 1,
            p + 2,
            p + 3,
            p + 4,
            p + 5
        ));
    }
    query.push_str(" ON CONFLICT (email) DO NOTHING RETURNING email");

    let mut q = sqlx::query_scalar(&query);
    for member in staff {
        q = q
            .bind(&member.email)
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(&member.short_name)
            .bind(member.category);
    }

    let emails: Vec<String> = q.fetch_all(&mut **tx).await?;
    Ok(emails)
}

pub async fn seed_subjects(db: &PgPool, count: usize) -> Result<Vec<String>, AppError> {
    let start_time = Instant::now();
    println!("📚 Seeding {} subjects...", count);

    let subjects = generate_subjects(count);
    let mut tx = db.begin().await?;
    let mut codes = Vec::with_capacity(subjects.len());
    for chunk in subjects.chunks(BATCH_SIZE) {
        codes.extend(insert_subjects_chunk(&mut tx, chunk).await?);
    }
    tx.commit().await?;

    println!(
        "   ✓ Inserted {} subjects in {:?}",
        codes.len(),
        start_time.elapsed()
    );
    Ok(codes)
}

async fn insert_subjects_chunk(
    tx: &mut Transaction<'_, Postgres>,
    subjects: &[SubjectSeed],
) -> Result<Vec<String>, AppError> {
    if subjects.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = String::from("INSERT INTO subjects (code, short_name, full_name) VALUES ");
    for i in 0..subjects.len() {
        if i > 0 {
            query.push_str(", ");
        }
        let p = i * 3;
        query.push_str(&format!("(${}, ${}, ${})", p + 1, p + 2, p + 3));
    }
    query.push_str(" ON CONFLICT (code) DO NOTHING RETURNING code");

    let mut q = sqlx::query_scalar(&query);
    for subject in subjects {
        q = q
            .bind(&subject.code)
            .bind(&subject.short_name)
            .bind(&subject.full_name);
    }

    let codes: Vec<String> = q.fetch_all(&mut **tx).await?;
    Ok(codes)
}

/// Removes seeded staff (cascading to their allocations) and seeded subjects.
pub async fn clear_staff_and_subjects(db: &PgPool) -> Result<(u64, u64), AppError> {
    let staff = sqlx::query("DELETE FROM staff WHERE email LIKE '%@' || $1")
        .bind(SEED_EMAIL_DOMAIN)
        .execute(db)
        .await?
        .rows_affected();

    let subjects = sqlx::query("DELETE FROM subjects WHERE code LIKE 'SEED%'")
        .execute(db)
        .await?
        .rows_affected();

    println!("   ✓ Deleted {} staff members and {} subjects", staff, subjects);
    Ok((staff, subjects))
}
