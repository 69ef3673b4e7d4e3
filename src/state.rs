use lectern_config::{DatabaseConfig, SyncConfig};
use lectern_core::AppError;
use lectern_db::init_db_pool;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: PgPool,
    pub sync: SyncConfig,
}

pub async fn init_app_state() -> Result<AppState, AppError> {
    let database = DatabaseConfig::from_env()?;
    Ok(AppState {
        db: init_db_pool(&database).await?,
        sync: SyncConfig::from_env(),
    })
}
