use lectern_config::SyncConfig;
use lectern_core::AppError;
use lectern_models::Email;
use lectern_observability::{
    track_documents_written, track_drift_detected, track_sync_failure, track_sync_plan,
};
use lectern_permissions::{
    Drift, PermissionDocument, PropagationPlan, StaffHandle, check_invariant, derive_documents,
};
use serde_json::Value;
use sqlx::{Connection, PgConnection, PgPool};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

use crate::modules::permissions::snapshot;

/// Failure while applying a plan to stored documents.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("stored permissions of {staff} are malformed: {source}")]
    MalformedDocument {
        staff: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("database error during propagation: {0}")]
    Database(#[from] sqlx::Error),
}

/// The structural change that produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    DepartmentSaved,
    DepartmentBatchesChanged,
    DepartmentDeleted,
    BatchFacultyChanged,
    BatchDeleted,
}

impl SyncEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEvent::DepartmentSaved => "department_saved",
            SyncEvent::DepartmentBatchesChanged => "department_batches_changed",
            SyncEvent::DepartmentDeleted => "department_deleted",
            SyncEvent::BatchFacultyChanged => "batch_faculty_changed",
            SyncEvent::BatchDeleted => "batch_deleted",
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing stored documents against the structure.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub staff_checked: usize,
    pub drifted: Vec<Drift>,
    pub malformed: Vec<StaffHandle>,
    pub rewritten: usize,
    pub dry_run: bool,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.drifted.is_empty() && self.malformed.is_empty()
    }
}

/// Result of applying a plan: documents written, and staff skipped because
/// their stored document could not be parsed.
#[derive(Debug, Default)]
struct AppliedPlan {
    written: usize,
    malformed: Vec<PropagationError>,
}

pub struct PermissionSyncService;

impl PermissionSyncService {
    /// Applies `plan` to the stored documents of the affected staff inside the
    /// caller's transaction.
    ///
    /// The writes run in a savepoint. A malformed stored document is skipped
    /// and the remaining documents are still written. Under the strict policy
    /// any failure, a skipped document included, rolls the savepoint back and
    /// aborts the caller's change. Under the lenient policy failures are
    /// logged and counted and the caller carries on.
    #[instrument(skip(conn, plan, config), fields(mutations = plan.len()))]
    pub async fn propagate(
        conn: &mut PgConnection,
        event: SyncEvent,
        plan: PropagationPlan,
        config: &SyncConfig,
    ) -> Result<(), AppError> {
        if plan.is_empty() {
            debug!(%event, "Nothing to propagate");
            return Ok(());
        }
        track_sync_plan(event.as_str(), plan.len());

        let mut savepoint = conn.begin().await.map_err(AppError::database)?;
        let outcome = match Self::apply_plan(&mut savepoint, &plan).await {
            Ok(mut applied) if config.is_strict() && !applied.malformed.is_empty() => {
                Err(applied.malformed.remove(0))
            }
            outcome => outcome,
        };

        match outcome {
            Ok(applied) => {
                savepoint.commit().await.map_err(AppError::database)?;
                track_documents_written(applied.written);
                for err in &applied.malformed {
                    Self::report_failure(event, config, err);
                }
                debug!(%event, written = applied.written, "Permission documents updated");
                Ok(())
            }
            Err(err) => {
                savepoint.rollback().await.map_err(AppError::database)?;
                Self::report_failure(event, config, &err);

                if config.is_strict() {
                    Err(AppError::internal(err))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn report_failure(event: SyncEvent, config: &SyncConfig, err: &PropagationError) {
        error!(
            %event,
            policy = %config.policy,
            error = %err,
            "Permission propagation failed"
        );
        track_sync_failure(event.as_str(), config.policy.as_str());
    }

    async fn apply_plan(
        conn: &mut PgConnection,
        plan: &PropagationPlan,
    ) -> Result<AppliedPlan, PropagationError> {
        let emails: Vec<String> = plan
            .affected_staff()
            .into_iter()
            .map(StaffHandle::into_inner)
            .collect();

        let rows = sqlx::query_as::<_, (String, Value)>(
            r#"SELECT email, permissions
               FROM staff
               WHERE email = ANY($1)
               ORDER BY email
               FOR UPDATE"#,
        )
        .bind(&emails)
        .fetch_all(&mut *conn)
        .await?;

        let mut applied = AppliedPlan::default();
        let mut documents = BTreeMap::new();
        for (email, permissions) in rows {
            match PermissionDocument::from_json(permissions) {
                Ok(document) => {
                    documents.insert(StaffHandle::new(email), document);
                }
                Err(source) => applied.malformed.push(PropagationError::MalformedDocument {
                    staff: email,
                    source,
                }),
            }
        }

        let changed = plan.apply(&mut documents);
        for staff in &changed {
            if let Some(document) = documents.get(staff) {
                Self::write_document(conn, staff, document).await?;
            }
        }

        applied.written = changed.len();
        Ok(applied)
    }

    async fn write_document(
        conn: &mut PgConnection,
        staff: &StaffHandle,
        document: &PermissionDocument,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE staff SET permissions = $1, updated_at = NOW() WHERE email = $2")
            .bind(document.to_json())
            .bind(staff.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Compares every stored document with the one derived from the current
    /// structure and, unless `dry_run`, rewrites the ones that differ.
    #[instrument(skip(db))]
    pub async fn reconcile(db: &PgPool, dry_run: bool) -> Result<ReconcileReport, AppError> {
        let mut tx = db.begin().await.map_err(AppError::database)?;

        let structure = snapshot::load_structure(&mut tx)
            .await
            .map_err(AppError::database)?;
        let rows = sqlx::query_as::<_, (String, Value)>(
            "SELECT email, permissions FROM staff ORDER BY email FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(AppError::database)?;

        let mut report = ReconcileReport {
            staff_checked: rows.len(),
            dry_run,
            ..Default::default()
        };

        let mut stored = BTreeMap::new();
        for (email, permissions) in rows {
            let staff = StaffHandle::new(email);
            match PermissionDocument::from_json(permissions) {
                Ok(document) => {
                    stored.insert(staff, document);
                }
                Err(err) => {
                    warn!(%staff, error = %err, "Stored permissions are malformed");
                    report.malformed.push(staff);
                }
            }
        }

        report.drifted = check_invariant(&structure, &stored)
            .into_iter()
            .filter(|d| !report.malformed.contains(&d.staff))
            .collect();
        track_drift_detected(report.drifted.len() + report.malformed.len());

        if dry_run {
            tx.rollback().await.map_err(AppError::database)?;
        } else {
            let mut expected = derive_documents(&structure);
            for staff in &report.malformed {
                let document = expected.remove(staff).unwrap_or_default();
                Self::write_document(&mut tx, staff, &document)
                    .await
                    .map_err(AppError::database)?;
            }
            for drift in &report.drifted {
                Self::write_document(&mut tx, &drift.staff, &drift.expected)
                    .await
                    .map_err(AppError::database)?;
            }
            report.rewritten = report.drifted.len() + report.malformed.len();
            tx.commit().await.map_err(AppError::database)?;
            track_documents_written(report.rewritten);
        }

        info!(
            checked = report.staff_checked,
            drifted = report.drifted.len(),
            malformed = report.malformed.len(),
            rewritten = report.rewritten,
            "Permission reconciliation finished"
        );
        Ok(report)
    }

    /// The stored document of one staff member.
    #[instrument(skip(db))]
    pub async fn document(db: &PgPool, email: &Email) -> Result<PermissionDocument, AppError> {
        let permissions =
            sqlx::query_scalar::<_, Value>("SELECT permissions FROM staff WHERE email = $1")
                .bind(email)
                .fetch_optional(db)
                .await
                .map_err(AppError::database)?
                .ok_or_else(|| {
                    AppError::not_found(anyhow::anyhow!("Staff member {} not found", email))
                })?;

        PermissionDocument::from_json(permissions).map_err(|err| {
            AppError::internal(PropagationError::MalformedDocument {
                staff: email.to_string(),
                source: err,
            })
        })
    }
}
