//! # Lectern
//!
//! College administration backend: staff, subjects, faculty allocations,
//! student batches and departments, with every staff member's permission
//! document kept in step with the structure.
//!
//! ## Architecture
//!
//! ```text
//! crates/
//! ├── lectern-core/           # AppError
//! ├── lectern-config/         # DatabaseConfig, SyncConfig
//! ├── lectern-db/             # pool and migrations
//! ├── lectern-models/         # rows, DTOs, ids, value types
//! ├── lectern-permissions/    # documents, observer hooks, plans, drift checks
//! └── lectern-observability/  # logging and metrics
//! src/
//! ├── cli/                    # operator helpers and the seeder
//! └── modules/                # one service per entity
//! ```
//!
//! ## Permission propagation
//!
//! Every structural service runs in one transaction. Department updates load
//! the current row `FOR UPDATE` and hand old and new snapshots to the
//! pre-save hook; batch membership and faculty changes are written first and
//! the hooks see the new sets. Each hook returns a plan which
//! [`PermissionSyncService::propagate`](modules::PermissionSyncService::propagate)
//! applies to the affected staff rows inside a savepoint.
//!
//! Set `PERMISSION_SYNC_POLICY=strict` to abort the structural change when
//! propagation fails; the default logs the failure and keeps the change, and
//! `lectern reconcile` repairs any drift afterwards.

pub mod cli;
pub mod modules;
pub mod state;
