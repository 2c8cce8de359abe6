//! Implementation of the `lab-agent init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::sqlite::{initialize_database, database_url, PoolConfig};
use crate::cli::display::{action_success, output, CommandOutput};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup::{create_config_file, SetupPaths};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file with the defaults
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub initialized_path: PathBuf,
    pub config_file: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let config_line = if self.config_written {
            action_success(&format!("Wrote {}", self.config_file.display()))
        } else {
            format!(
                "Kept existing {} (use --force to overwrite)",
                self.config_file.display()
            )
        };
        [
            config_line,
            action_success(&format!("Database ready at {}", self.database_path.display())),
        ]
        .join("\n")
    }
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let paths = SetupPaths::for_root(&target_path);
    let config_written = create_config_file(&paths, args.force)?;

    let config = ConfigLoader::load_from_dir(&target_path)?;
    let database_path = resolve(&target_path, &config.database.path);
    let url = database_url(&database_path.to_string_lossy());
    let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| format!("Failed to initialize database at {}", database_path.display()))?;
    pool.close().await;

    let result = InitOutput {
        initialized_path: target_path,
        config_file: paths.config_file,
        config_written,
        database_path,
    };
    output(&result, json_mode);
    Ok(())
}
