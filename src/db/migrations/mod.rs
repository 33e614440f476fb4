//! Schema migrations for the local cache.
//!
//! `migration_NN_up.sql` brings the schema to version `NN` and `migration_NN_down.sql` takes it
//! back to `NN - 1`. The `schema_version` table holds a single row with the current version.

use anyhow::{ensure, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

use crate::error::Res;

/// The schema version this build of the program expects.
pub(crate) const CURRENT_VERSION: i32 = 1;

/// Up and down SQL per version. `SCRIPTS[n - 1]` belongs to version `n`.
const SCRIPTS: &[(&str, &str)] = &[(
    include_str!("migration_01_up.sql"),
    include_str!("migration_01_down.sql"),
)];

/// A script and the schema version the database is at once it has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    sql: &'static str,
    leaves_at: i32,
}

fn scripts_for(version: i32) -> Option<(&'static str, &'static str)> {
    let index = usize::try_from(version).ok()?.checked_sub(1)?;
    SCRIPTS.get(index).copied()
}

/// Lists the scripts that take the schema from `from` to `to`, in order. Fails if any of them is
/// missing, so nothing is applied for a gap in the sequence.
fn plan_steps(from: i32, to: i32) -> Res<Vec<Step>> {
    let upgrading = from < to;
    let versions: Vec<i32> = if upgrading {
        (from + 1..=to).collect()
    } else {
        (to + 1..=from).rev().collect()
    };

    versions
        .into_iter()
        .map(|version| {
            let (up, down) = scripts_for(version).with_context(|| {
                format!("No migration exists for schema version {version}, so {from} cannot become {to}")
            })?;
            Ok(if upgrading {
                Step {
                    sql: up,
                    leaves_at: version,
                }
            } else {
                Step {
                    sql: down,
                    leaves_at: version - 1,
                }
            })
        })
        .collect()
}

/// Migrates the schema from version `from` to version `to`, one transaction per step.
pub(crate) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Res<()> {
    let steps = plan_steps(from, to)?;
    if steps.is_empty() {
        debug!("Schema is at version {to}");
        return Ok(());
    }
    for step in steps {
        apply(pool, step)
            .await
            .with_context(|| format!("Migrating the schema to version {} failed", step.leaves_at))?;
    }
    debug!("Migrated the schema from version {from} to {to}");
    Ok(())
}

async fn apply(pool: &SqlitePool, step: Step) -> Res<()> {
    debug!("Applying migration to schema version {:02}", step.leaves_at);
    let mut tx = pool.begin().await.context("Unable to begin a transaction")?;

    tx.execute(step.sql)
        .await
        .context("The migration script failed")?;

    let updated = sqlx::query("UPDATE schema_version SET version = ?")
        .bind(step.leaves_at)
        .execute(&mut *tx)
        .await
        .context("Unable to record the schema version")?;
    ensure!(
        updated.rows_affected() == 1,
        "The schema_version table must hold exactly one row, found {}",
        updated.rows_affected()
    );

    tx.commit().await.context("Unable to commit the migration")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;
    use tempfile::TempDir;

    const TABLES: [&str; 4] = ["transactions", "contacts", "cost_centres", "accounting_types"];

    async fn make_pool(dir: &TempDir) -> SqlitePool {
        let url = format!("sqlite:{}", dir.path().join("cache.sqlite").display());
        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn make_versioned_pool(dir: &TempDir) -> SqlitePool {
        let pool = make_pool(dir).await;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn version(pool: &SqlitePool) -> i32 {
        sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn tables(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_then_downgrade() {
        let dir = TempDir::new().unwrap();
        let pool = make_versioned_pool(&dir).await;

        run(&pool, 0, CURRENT_VERSION).await.unwrap();
        assert_eq!(version(&pool).await, CURRENT_VERSION);
        let created = tables(&pool).await;
        for table in TABLES {
            assert!(created.iter().any(|t| t == table), "{table} missing");
        }

        run(&pool, CURRENT_VERSION, 0).await.unwrap();
        assert_eq!(version(&pool).await, 0);
        assert_eq!(tables(&pool).await, vec!["schema_version".to_string()]);
    }

    #[tokio::test]
    async fn test_same_version_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let pool = make_versioned_pool(&dir).await;
        run(&pool, 0, 1).await.unwrap();
        run(&pool, 1, 1).await.unwrap();
        assert_eq!(version(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_missing_version_row_rolls_back() {
        let dir = TempDir::new().unwrap();
        let pool = make_pool(&dir).await;
        assert!(run(&pool, 0, 1).await.is_err());
        assert_eq!(tables(&pool).await, vec!["schema_version".to_string()]);
    }

    #[test]
    fn test_plan_steps() {
        let up = plan_steps(0, 1).unwrap();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].leaves_at, 1);
        assert!(up[0].sql.contains("CREATE TABLE transactions"));

        let down = plan_steps(1, 0).unwrap();
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].leaves_at, 0);
        assert!(down[0].sql.contains("DROP TABLE"));

        assert!(plan_steps(1, 1).unwrap().is_empty());
    }

    #[test]
    fn test_plan_steps_fails_on_a_gap() {
        assert!(plan_steps(0, 2).is_err());
        assert!(plan_steps(3, 1).is_err());
        assert!(plan_steps(-1, 1).is_err());
    }
}
