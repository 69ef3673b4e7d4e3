use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use dotenvy::dotenv;
use lectern::cli::render_reconcile_report;
use lectern::cli::seeder::{SeedConfig, clear_seed, seed_all};
use lectern::modules::{DepartmentService, PermissionSyncService, StaffService};
use lectern::state::{AppState, init_app_state};
use lectern_core::AppError;
use lectern_db::run_migrations;
use lectern_models::{CreateStaffDto, DepartmentId, Email, StaffCategory};
use lectern_observability::{LoggingConfig, init_basic_console_logging, init_logging};
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Lectern - college administration and permission maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a staff member (missing fields are prompted for)
    CreateStaff {
        #[arg(short = 'e', long)]
        email: Option<String>,

        #[arg(short = 'f', long)]
        first_name: Option<String>,

        #[arg(long)]
        middle_name: Option<String>,

        #[arg(short = 'l', long)]
        last_name: Option<String>,

        /// Up to 5 characters, e.g. initials
        #[arg(short = 's', long)]
        short_name: Option<String>,

        /// T (teaching) or NT (non-teaching)
        #[arg(short = 'c', long)]
        category: Option<StaffCategory>,

        #[arg(long)]
        admin: bool,
    },
    /// Print a staff member's stored permission document
    ShowPermissions { email: String },
    /// Compare stored permission documents with the college structure and repair drift
    Reconcile {
        /// Report drift without rewriting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Lock a department, revoking every entry it grants
    LockDepartment { id: DepartmentId },
    /// Unlock a department, granting its HOD and faculty entries again
    UnlockDepartment { id: DepartmentId },
    /// Seed the database with fake staff, subjects, batches and departments
    Seed {
        #[arg(long, default_value = "30")]
        staff: usize,

        #[arg(long, default_value = "12")]
        subjects: usize,

        #[arg(short = 'd', long, default_value = "4")]
        departments: usize,

        #[arg(long, default_value = "3")]
        batches: usize,

        #[arg(long, default_value = "4")]
        faculty: usize,

        #[arg(long, default_value = "2024-25")]
        year: String,
    },
    /// Clear all seeded data
    ClearSeed {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    if let Err(err) = init_logging(&LoggingConfig::from_env()) {
        init_basic_console_logging();
        warn!(error = %err, "File logging unavailable, logging to console only");
    }

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(kind = err.kind.as_str(), error = %err.error, "Command failed");
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let state = init_app_state().await?;

    match cli.command {
        Commands::Migrate => {
            run_migrations(&state.db).await?;
            println!("✅ Migrations applied");
        }
        Commands::CreateStaff {
            email,
            first_name,
            middle_name,
            last_name,
            short_name,
            category,
            admin,
        } => {
            handle_create_staff(
                &state,
                email,
                first_name,
                middle_name,
                last_name,
                short_name,
                category,
                admin,
            )
            .await?
        }
        Commands::ShowPermissions { email } => {
            let email = Email::new(email).map_err(AppError::bad_request)?;
            let document = StaffService::get_permissions(&state.db, &email).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Reconcile { dry_run } => {
            let report = PermissionSyncService::reconcile(&state.db, dry_run).await?;
            print!("{}", render_reconcile_report(&report));
        }
        Commands::LockDepartment { id } => {
            let department = DepartmentService::lock_department(&state.db, &state.sync, id).await?;
            println!(
                "🔒 Department {}/{}/{} locked",
                department.year, department.semester, department.name
            );
        }
        Commands::UnlockDepartment { id } => {
            let department =
                DepartmentService::unlock_department(&state.db, &state.sync, id).await?;
            println!(
                "🔓 Department {}/{}/{} unlocked",
                department.year, department.semester, department.name
            );
        }
        Commands::Seed {
            staff,
            subjects,
            departments,
            batches,
            faculty,
            year,
        } => {
            let config = SeedConfig {
                staff,
                subjects,
                departments,
                batches_per_department: batches,
                faculty_per_batch: faculty,
                year,
            };
            seed_all(&state.db, &state.sync, config).await?;
        }
        Commands::ClearSeed { yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Delete all seeded staff, subjects and departments?")
                    .default(false)
                    .interact()?;
            if confirmed {
                clear_seed(&state.db, &state.sync).await?;
            } else {
                println!("Aborted");
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_create_staff(
    state: &AppState,
    email: Option<String>,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    short_name: Option<String>,
    category: Option<StaffCategory>,
    admin: bool,
) -> Result<(), AppError> {
    let email = prompt(email, "Email address")?;
    let first_name = prompt(first_name, "First name")?;
    let middle_name = match middle_name {
        Some(name) => Some(name),
        None => {
            let name: String = Input::new()
                .with_prompt("Middle name (optional)")
                .allow_empty(true)
                .interact_text()?;
            Some(name).filter(|n| !n.trim().is_empty())
        }
    };
    let last_name = prompt(last_name, "Last name")?;
    let short_name = prompt(short_name, "Short name")?;
    let category = match category {
        Some(category) => category,
        None => {
            let choice = Select::new()
                .with_prompt("Category")
                .items(&["Teaching (T)", "Non-teaching (NT)"])
                .default(0)
                .interact()?;
            if choice == 0 {
                StaffCategory::Teaching
            } else {
                StaffCategory::NonTeaching
            }
        }
    };

    let dto = CreateStaffDto {
        email: Email::new(email).map_err(AppError::bad_request)?,
        first_name,
        middle_name,
        last_name,
        short_name,
        category,
        admin,
    };

    let staff = StaffService::create_staff(&state.db, dto).await?;
    println!("✅ Staff member {} <{}> created", staff.full_name(), staff.email);
    Ok(())
}

fn prompt(value: Option<String>, label: &str) -> Result<String, AppError> {
    match value {
        Some(value) => Ok(value),
        None => Ok(Input::new().with_prompt(label).interact_text()?),
    }
}
