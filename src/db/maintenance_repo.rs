use anyhow::Result;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{date_column, lock, optional_date_column};
use crate::models::{Capability, MaintenanceRecord, Profile};
use crate::services::access;
use crate::utils::date::format_date;
use crate::utils::error::AppError;

pub struct MaintenanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaintenanceRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Registrera en servicepost
    pub fn create(&self, actor: &Profile, record: &mut MaintenanceRecord) -> Result<i64> {
        record.validate()?;

        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManageAssets)?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM operational_assets WHERE id = ?)",
            [record.asset_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::not_found(format!("Tillgång {}", record.asset_id)).into());
        }

        conn.execute(
            "INSERT INTO maintenance_records (asset_id, date, description, cost, vendor, next_due)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.asset_id,
                format_date(record.date),
                record.description.trim(),
                record.cost,
                record.vendor,
                record.next_due.map(format_date),
            ],
        )?;

        let id = conn.last_insert_rowid();
        record.id = Some(id);
        info!("Service registrerad för tillgång {}", record.asset_id);

        Ok(id)
    }

    /// Serviceposter för en tillgång, senaste först
    pub fn find_by_asset(&self, asset_id: i64) -> Result<Vec<MaintenanceRecord>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, asset_id, date, description, cost, vendor, next_due, created_at
             FROM maintenance_records
             WHERE asset_id = ?
             ORDER BY date DESC, id DESC",
        )?;

        let records = stmt
            .query_map([asset_id], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    pub fn total_cost(&self, asset_id: i64) -> Result<f64> {
        let conn = lock(&self.conn)?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(cost), 0) FROM maintenance_records WHERE asset_id = ?",
            [asset_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn delete(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManageAssets)?;
        let rows = conn.execute("DELETE FROM maintenance_records WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Servicepost {}", id)).into());
        }
        Ok(())
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<MaintenanceRecord> {
        Ok(MaintenanceRecord {
            id: row.get(0)?,
            asset_id: row.get(1)?,
            date: date_column(row, 2)?,
            description: row.get(3)?,
            cost: row.get(4)?,
            vendor: row.get(5)?,
            next_due: optional_date_column(row, 6)?,
            created_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Asset;
    use chrono::NaiveDate;

    #[test]
    fn test_records_and_total_cost() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let mut asset = Asset::new("VAN-01", "Servicebil", "Fordon");
        let asset_id = db.assets().create(&admin, &mut asset).unwrap();

        let repo = db.maintenance();
        let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let second = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        repo.create(&admin, &mut MaintenanceRecord::new(asset_id, first, "Däckbyte", 2400.0))
            .unwrap();
        let mut oil = MaintenanceRecord::new(asset_id, second, "Oljebyte", 900.0);
        oil.next_due = NaiveDate::from_ymd_opt(2025, 9, 1);
        repo.create(&admin, &mut oil).unwrap();

        let records = repo.find_by_asset(asset_id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "Oljebyte");
        assert_eq!(records[0].next_due, NaiveDate::from_ymd_opt(2025, 9, 1));
        assert_eq!(repo.total_cost(asset_id).unwrap(), 3300.0);
    }

    #[test]
    fn test_missing_asset() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let err = db
            .maintenance()
            .create(&admin, &mut MaintenanceRecord::new(77, date, "Kontroll", 0.0))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::NotFound(_))));
    }
}
