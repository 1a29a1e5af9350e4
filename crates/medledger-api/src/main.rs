//! medledger server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, and serves the JSON API over HTTP.
//!
//! # Staff provisioning
//!
//! Staff members are provisioned out-of-band by an operator:
//!
//! ```
//! cargo run -p medledger-api --bin server -- \
//!   --add-staff --staff-name "A. Nurse" --staff-phone "+91..." \
//!   --staff-role hospital_staff
//! ```

use std::{
  path::{Path, PathBuf},
  str::FromStr as _,
};

use anyhow::Context as _;
use clap::Parser;
use medledger_api::{AppState, ServerConfig};
use medledger_core::{
  access::Role, staff::NewStaffMember, store::SecurityStore as _,
};
use medledger_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "medledger API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Register a staff member and exit.
  #[arg(long)]
  add_staff: bool,

  #[arg(long, requires = "add_staff")]
  staff_name: Option<String>,

  #[arg(long, requires = "add_staff")]
  staff_phone: Option<String>,

  /// `hospital_staff` or `insurance_staff`.
  #[arg(long, requires = "add_staff")]
  staff_role: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("MEDLEDGER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: provision a staff member and exit.
  if cli.add_staff {
    let name = cli.staff_name.context("--staff-name is required")?;
    let phone = cli.staff_phone.context("--staff-phone is required")?;
    let role = cli.staff_role.context("--staff-role is required")?;
    let role = Role::from_str(&role)
      .map_err(|_| anyhow::anyhow!("unknown role: {role}"))?;
    if !role.is_staff() {
      anyhow::bail!("--staff-role must be a staff role, got {role}");
    }

    let member = store
      .add_staff(NewStaffMember { name, phone, role })
      .await
      .context("failed to add staff member")?;
    println!("{}", member.id);
    return Ok(());
  }

  let state = AppState::new(store, server_cfg.clone());
  let app = medledger_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
