//! This module is responsible for reading, writing and managing the SQLite cache of accounting
//! service records.

mod migrations;

use crate::error::Res;
use crate::model::{
    AccountingType, Amount, Contact, CostCentre, Snapshot, Transaction, TransactionStatus,
};
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Opens the SQLite file at `path`, creating it if it does not exist
    /// - Updates the database schema with migrations if it is out-of-date
    /// - Returns a constructed `Db` object for further operations
    pub(crate) async fn open(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .context("Failed to parse SQLite connection string")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Unable to open the database at {}", path.display()))?;

        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create schema_version table")?;

        let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .context("Failed to query schema version")?;
        let current = match row.0 {
            Some(version) => version,
            None => {
                sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
                    .execute(&pool)
                    .await
                    .context("Failed to insert initial schema version")?;
                0
            }
        };

        anyhow::ensure!(
            current <= migrations::CURRENT_VERSION,
            "The database schema version {current} is newer than this program supports ({})",
            migrations::CURRENT_VERSION
        );
        migrations::run(&pool, current, migrations::CURRENT_VERSION).await?;
        debug!("Opened database at {}", path.display());
        Ok(Self { pool })
    }

    /// Replaces all cached records with those in `snapshot`, in a single transaction.
    pub(crate) async fn save_snapshot(&self, snapshot: &Snapshot) -> Res<()> {
        let loaded_at = chrono::Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for table in [
            "transactions",
            "contacts",
            "cost_centres",
            "accounting_types",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {table}"))?;
        }

        for t in snapshot.transactions() {
            sqlx::query(
                "INSERT INTO transactions (id, value_date, amount, purpose, payee, status, \
                check_account_id, sev_client_id, loaded_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
                ON CONFLICT(id) DO UPDATE SET value_date = excluded.value_date, \
                amount = excluded.amount, purpose = excluded.purpose, payee = excluded.payee, \
                status = excluded.status, check_account_id = excluded.check_account_id, \
                sev_client_id = excluded.sev_client_id, loaded_at = excluded.loaded_at",
            )
            .bind(t.id())
            .bind(t.value_date().format("%Y-%m-%d").to_string())
            .bind(t.amount().value().to_string())
            .bind(t.purpose())
            .bind(t.payee())
            .bind(t.status().code())
            .bind(t.check_account_id())
            .bind(t.sev_client_id())
            .bind(loaded_at.as_str())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to save transaction {}", t.id()))?;
        }

        for c in snapshot.contacts() {
            sqlx::query(
                "INSERT OR REPLACE INTO contacts (id, name, category_id, customer_number, \
                supplier_number) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(c.id())
            .bind(c.name())
            .bind(c.category_id())
            .bind(c.customer_number())
            .bind(c.supplier_number())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to save contact {}", c.id()))?;
        }

        for cc in snapshot.cost_centres() {
            sqlx::query("INSERT OR REPLACE INTO cost_centres (id, name, status) VALUES (?, ?, ?)")
                .bind(cc.id())
                .bind(cc.name())
                .bind(cc.status_code())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to save cost centre {}", cc.id()))?;
        }

        for at in snapshot.accounting_types() {
            sqlx::query("INSERT OR REPLACE INTO accounting_types (id, name) VALUES (?, ?)")
                .bind(at.id())
                .bind(at.name())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to save accounting type {}", at.id()))?;
        }

        tx.commit().await.context("Failed to commit snapshot")?;
        debug!(
            "Saved {} transactions, {} contacts, {} cost centres and {} accounting types",
            snapshot.transactions().len(),
            snapshot.contacts().len(),
            snapshot.cost_centres().len(),
            snapshot.accounting_types().len()
        );
        Ok(())
    }

    /// Loads all cached records. Transactions are ordered by value date and id. Rows that cannot
    /// be parsed are skipped with a warning.
    pub(crate) async fn load_snapshot(&self) -> Res<Snapshot> {
        let rows = sqlx::query(
            "SELECT id, value_date, amount, purpose, payee, status, check_account_id, \
            sev_client_id FROM transactions ORDER BY value_date, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load transactions")?;
        let transactions = rows
            .iter()
            .filter_map(|row| skip_malformed("transaction", row, transaction_from_row(row)))
            .collect();

        let rows = sqlx::query(
            "SELECT id, name, category_id, customer_number, supplier_number FROM contacts \
            ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load contacts")?;
        let contacts = rows
            .iter()
            .filter_map(|row| skip_malformed("contact", row, contact_from_row(row)))
            .collect();

        let rows = sqlx::query("SELECT id, name, status FROM cost_centres ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load cost centres")?;
        let cost_centres = rows
            .iter()
            .filter_map(|row| skip_malformed("cost centre", row, cost_centre_from_row(row)))
            .collect();

        let rows = sqlx::query("SELECT id, name FROM accounting_types ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load accounting types")?;
        let accounting_types = rows
            .iter()
            .filter_map(|row| {
                skip_malformed("accounting type", row, accounting_type_from_row(row))
            })
            .collect();

        Ok(Snapshot::new(
            transactions,
            contacts,
            cost_centres,
            accounting_types,
        ))
    }

    /// Records a new status for a cached transaction. Returns false if the transaction is not
    /// cached.
    pub(crate) async fn set_transaction_status(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> Res<bool> {
        let result = sqlx::query("UPDATE transactions SET status = ? WHERE id = ?")
            .bind(status.code())
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update the status of transaction {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns the number of rows in the transactions table.
    pub(crate) async fn count_transactions(&self) -> Res<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;
        Ok(u64::try_from(row.0).unwrap_or_default())
    }
}

fn skip_malformed<T>(kind: &str, row: &SqliteRow, parsed: Res<T>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(e) => {
            let id: String = row.try_get("id").unwrap_or_default();
            warn!("Skipping malformed cached {kind} '{id}': {e:#}");
            None
        }
    }
}

fn transaction_from_row(row: &SqliteRow) -> Res<Transaction> {
    let id: String = row.try_get("id")?;
    let value_date: String = row.try_get("value_date")?;
    let amount: String = row.try_get("amount")?;
    let status: i64 = row.try_get("status")?;
    let value_date = NaiveDate::parse_from_str(&value_date, "%Y-%m-%d")
        .with_context(|| format!("Invalid value date '{value_date}'"))?;
    let amount =
        Amount::from_str(&amount).map_err(|e| anyhow!("Invalid amount '{amount}': {e}"))?;
    let status = TransactionStatus::from_code(status)
        .ok_or_else(|| anyhow!("Unknown transaction status {status}"))?;
    Ok(Transaction::new(
        id,
        value_date,
        amount,
        row.try_get::<String, _>("purpose")?,
        row.try_get::<String, _>("payee")?,
    )
    .with_status(status)
    .with_accounts(
        row.try_get::<String, _>("check_account_id")?,
        row.try_get::<String, _>("sev_client_id")?,
    ))
}

fn contact_from_row(row: &SqliteRow) -> Res<Contact> {
    let mut contact = Contact::new(
        row.try_get::<String, _>("id")?,
        row.try_get::<String, _>("name")?,
    )
    .with_numbers(
        row.try_get("customer_number")?,
        row.try_get("supplier_number")?,
    );
    if let Some(category) = row.try_get::<Option<String>, _>("category_id")? {
        contact = contact.with_category(category);
    }
    Ok(contact)
}

fn cost_centre_from_row(row: &SqliteRow) -> Res<CostCentre> {
    let status: i64 = row.try_get("status")?;
    Ok(CostCentre::new(
        row.try_get::<String, _>("id")?,
        row.try_get::<String, _>("name")?,
    )
    .with_active(CostCentre::active_from_code(status)))
}

fn accounting_type_from_row(row: &SqliteRow) -> Res<AccountingType> {
    Ok(AccountingType::new(
        row.try_get::<String, _>("id")?,
        row.try_get::<String, _>("name")?,
    ))
}
