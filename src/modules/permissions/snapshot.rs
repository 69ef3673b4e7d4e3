//! Builds observer snapshots from the current rows.
//!
//! Every loader takes the connection of the running transaction so the
//! snapshot sees the writes made earlier in the same mutation.

use lectern_permissions::{BatchState, DepartmentScope, DepartmentState, StaffHandle};
use sqlx::{FromRow, PgConnection};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct DepartmentRow {
    id: Uuid,
    year: String,
    semester: String,
    name: String,
    hod_email: String,
    locked: bool,
}

impl DepartmentRow {
    fn into_state(self, batches: Vec<BatchState>) -> DepartmentState {
        DepartmentState {
            id: self.id,
            scope: DepartmentScope::new(self.year, self.semester, self.name),
            hod: StaffHandle::new(self.hod_email),
            locked: self.locked,
            batches,
        }
    }
}

/// Loads one department, locking its row and then its batch rows.
pub async fn load_department_for_update(
    conn: &mut PgConnection,
    department_id: Uuid,
) -> Result<Option<DepartmentState>, sqlx::Error> {
    lock_department_with_batches(conn, department_id, &[]).await
}

/// Locks the department row, then its batches together with `extra_batches`
/// in id order, and loads the department.
///
/// Faculty changes lock the batch row before reading which departments
/// contain it, so the two serialize on the batch rows.
pub async fn lock_department_with_batches(
    conn: &mut PgConnection,
    department_id: Uuid,
    extra_batches: &[Uuid],
) -> Result<Option<DepartmentState>, sqlx::Error> {
    let row = sqlx::query_as::<_, DepartmentRow>(
        r#"SELECT id, year, semester, name, hod_email, locked
           FROM departments
           WHERE id = $1
           FOR UPDATE"#,
    )
    .bind(department_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let batch_ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT batch_id FROM department_batches WHERE department_id = $1",
    )
    .bind(department_id)
    .fetch_all(&mut *conn)
    .await?;

    let to_lock: Vec<Uuid> = batch_ids
        .iter()
        .chain(extra_batches)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    lock_batches(conn, &to_lock).await?;

    let batches = load_batches(conn, &batch_ids).await?;
    Ok(Some(row.into_state(batches)))
}

/// Locks batch rows in id order. Returns the ids that exist.
pub async fn lock_batches(
    conn: &mut PgConnection,
    batch_ids: &[Uuid],
) -> Result<Vec<Uuid>, sqlx::Error> {
    if batch_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM batches WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(batch_ids)
    .fetch_all(&mut *conn)
    .await
}

/// Every department currently containing `batch_id`.
pub async fn load_departments_containing(
    conn: &mut PgConnection,
    batch_id: Uuid,
) -> Result<Vec<DepartmentState>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DepartmentRow>(
        r#"SELECT d.id, d.year, d.semester, d.name, d.hod_email, d.locked
           FROM departments d
           JOIN department_batches db ON db.department_id = d.id
           WHERE db.batch_id = $1
           ORDER BY d.year, d.semester, d.name"#,
    )
    .bind(batch_id)
    .fetch_all(&mut *conn)
    .await?;

    attach_batches(conn, rows).await
}

/// The whole college structure.
pub async fn load_structure(conn: &mut PgConnection) -> Result<Vec<DepartmentState>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DepartmentRow>(
        r#"SELECT id, year, semester, name, hod_email, locked
           FROM departments
           ORDER BY year, semester, name"#,
    )
    .fetch_all(&mut *conn)
    .await?;

    attach_batches(conn, rows).await
}

pub async fn load_batch(
    conn: &mut PgConnection,
    batch_id: Uuid,
) -> Result<Option<BatchState>, sqlx::Error> {
    Ok(load_batches(conn, &[batch_id]).await?.into_iter().next())
}

/// Batches with their faculty sets, ordered by name. Unknown ids are skipped.
pub async fn load_batches(
    conn: &mut PgConnection,
    batch_ids: &[Uuid],
) -> Result<Vec<BatchState>, sqlx::Error> {
    if batch_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, name FROM batches WHERE id = ANY($1) ORDER BY name, id",
    )
    .bind(batch_ids)
    .fetch_all(&mut *conn)
    .await?;

    let faculty = sqlx::query_as::<_, (Uuid, String)>(
        r#"SELECT DISTINCT bf.batch_id, fa.staff_email
           FROM batch_faculty bf
           JOIN faculty_allocations fa ON fa.id = bf.allocation_id
           WHERE bf.batch_id = ANY($1)"#,
    )
    .bind(batch_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_batch: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();
    for (batch_id, email) in faculty {
        by_batch.entry(batch_id).or_default().push(email);
    }

    Ok(rows
        .into_iter()
        .map(|(id, name)| {
            let faculty = by_batch.remove(&id).unwrap_or_default();
            BatchState::new(id, name).with_faculty(faculty)
        })
        .collect())
}

async fn attach_batches(
    conn: &mut PgConnection,
    rows: Vec<DepartmentRow>,
) -> Result<Vec<DepartmentState>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let department_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let links = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT department_id, batch_id FROM department_batches WHERE department_id = ANY($1)",
    )
    .bind(&department_ids)
    .fetch_all(&mut *conn)
    .await?;

    let batch_ids: Vec<Uuid> = links.iter().map(|(_, b)| *b).collect();
    let batches: BTreeMap<Uuid, BatchState> = load_batches(conn, &batch_ids)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();

    let mut members: BTreeMap<Uuid, Vec<BatchState>> = BTreeMap::new();
    for (department_id, batch_id) in links {
        if let Some(batch) = batches.get(&batch_id) {
            members.entry(department_id).or_default().push(batch.clone());
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut batches = members.remove(&row.id).unwrap_or_default();
            batches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            row.into_state(batches)
        })
        .collect())
}
