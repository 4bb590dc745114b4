use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::debug;

/// Runs SQL migrations by spawning the goose binary
///
/// Migrations live next to the crate that owns the schema; the binary path,
/// directory and DSN come from service configuration.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    /// goose driver name, e.g. "postgres"
    driver: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: String,
        migrations_dir: String,
        driver: String,
        dsn: String,
    ) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            driver,
            dsn,
        }
    }

    /// Apply all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        debug!(migrations_dir = %self.migrations_dir, "running migrations");
        let output = Command::new(&self.goose_binary_path)
            .args(self.up_args())
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "goose up failed ({}).\nstdout: {}\nstderr: {}",
                output.status,
                stdout,
                stderr
            );
        }

        debug!("migrations completed:\n{}", stdout);
        Ok(())
    }

    fn up_args(&self) -> [&str; 5] {
        ["-dir", &self.migrations_dir, &self.driver, &self.dsn, "up"]
    }
}
