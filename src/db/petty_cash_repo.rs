use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{date_column, lock};
use crate::models::{Capability, CashKind, PettyCashTransaction, Profile};
use crate::services::access;
use crate::utils::date::format_date;
use crate::utils::error::AppError;

const SELECT_TRANSACTION: &str = "SELECT id, date, kind, amount, category, description,
            receipt_url, created_by, created_at, updated_at
     FROM petty_cash_transactions";

pub struct PettyCashRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PettyCashRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Hämta alla transaktioner i datumordning
    pub fn find_all(&self) -> Result<Vec<PettyCashTransaction>> {
        let conn = lock(&self.conn)?;
        Self::query(&conn, "", params![])
    }

    pub fn find_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PettyCashTransaction>> {
        let conn = lock(&self.conn)?;
        Self::query(
            &conn,
            "WHERE date BETWEEN ?1 AND ?2",
            params![format_date(from), format_date(to)],
        )
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<PettyCashTransaction>> {
        let conn = lock(&self.conn)?;
        let transaction = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_TRANSACTION),
                [id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(transaction)
    }

    pub fn create(&self, actor: &Profile, transaction: &mut PettyCashTransaction) -> Result<i64> {
        transaction.validate()?;

        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManagePettyCash)?;
        conn.execute(
            "INSERT INTO petty_cash_transactions (date, kind, amount, category, description,
                    receipt_url, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                format_date(transaction.date),
                transaction.kind.to_string(),
                transaction.amount,
                transaction.category.trim(),
                transaction.description,
                transaction.receipt_url,
                actor.id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        transaction.id = Some(id);
        transaction.created_by = actor.id;
        info!(
            "Småkassa: {} {:.2} ({})",
            transaction.kind, transaction.amount, transaction.category
        );

        Ok(id)
    }

    pub fn update(&self, actor: &Profile, transaction: &PettyCashTransaction) -> Result<()> {
        transaction.validate()?;

        let id = transaction
            .id
            .ok_or_else(|| AppError::validation("Transaktionen saknar id"))?;

        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManagePettyCash)?;
        let rows = conn.execute(
            "UPDATE petty_cash_transactions SET
                date = ?1, kind = ?2, amount = ?3, category = ?4, description = ?5,
                receipt_url = ?6, updated_at = datetime('now')
             WHERE id = ?7",
            params![
                format_date(transaction.date),
                transaction.kind.to_string(),
                transaction.amount,
                transaction.category.trim(),
                transaction.description,
                transaction.receipt_url,
                id,
            ],
        )?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Transaktion {}", id)).into());
        }

        info!("Uppdaterade småkassetransaktion {}", id);
        Ok(())
    }

    pub fn delete(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManagePettyCash)?;
        let rows = conn.execute("DELETE FROM petty_cash_transactions WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Transaktion {}", id)).into());
        }

        info!("Tog bort småkassetransaktion {}", id);
        Ok(())
    }

    fn query<P: rusqlite::Params>(
        conn: &Connection,
        where_clause: &str,
        params: P,
    ) -> Result<Vec<PettyCashTransaction>> {
        let mut stmt = conn.prepare(&format!(
            "{} {} ORDER BY date, id",
            SELECT_TRANSACTION, where_clause
        ))?;
        let transactions = stmt
            .query_map(params, Self::row_to_transaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transactions)
    }

    fn row_to_transaction(row: &Row) -> rusqlite::Result<PettyCashTransaction> {
        let kind: String = row.get(2)?;
        Ok(PettyCashTransaction {
            id: row.get(0)?,
            date: date_column(row, 1)?,
            kind: CashKind::from_db_str(&kind).unwrap_or(CashKind::Expense),
            amount: row.get(3)?,
            category: row.get(4)?,
            description: row.get(5)?,
            receipt_url: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
