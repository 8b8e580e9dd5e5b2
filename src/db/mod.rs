pub mod schema;
pub mod migrations;
pub mod water_repo;
pub mod electricity_repo;
pub mod travel_repo;
pub mod asset_repo;
pub mod maintenance_repo;
pub mod petty_cash_repo;
pub mod profile_repo;
pub mod pipeline_repo;

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use water_repo::WaterRepository;
pub use electricity_repo::ElectricityRepository;
pub use travel_repo::TravelRepository;
pub use asset_repo::AssetRepository;
pub use maintenance_repo::MaintenanceRepository;
pub use petty_cash_repo::PettyCashRepository;
pub use profile_repo::ProfileRepository;
pub use pipeline_repo::PipelineRepository;

/// Huvuddatabas-wrapper med thread-safe access
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Öppna eller skapa databas och kör migrationer
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Öppna in-memory databas (för tester)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Kör databasmigrationer
    pub fn migrate(&self) -> Result<()> {
        let conn = lock(&self.conn)?;
        migrations::run_migrations(&conn)
    }

    pub fn water(&self) -> WaterRepository {
        WaterRepository::new(Arc::clone(&self.conn))
    }

    pub fn electricity(&self) -> ElectricityRepository {
        ElectricityRepository::new(Arc::clone(&self.conn))
    }

    pub fn travel(&self) -> TravelRepository {
        TravelRepository::new(Arc::clone(&self.conn))
    }

    pub fn assets(&self) -> AssetRepository {
        AssetRepository::new(Arc::clone(&self.conn))
    }

    pub fn maintenance(&self) -> MaintenanceRepository {
        MaintenanceRepository::new(Arc::clone(&self.conn))
    }

    pub fn petty_cash(&self) -> PettyCashRepository {
        PettyCashRepository::new(Arc::clone(&self.conn))
    }

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(Arc::clone(&self.conn))
    }

    pub fn pipeline(&self) -> PipelineRepository {
        PipelineRepository::new(Arc::clone(&self.conn))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Lås anslutningen; ett förgiftat lås blir ett fel i stället för panik
pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("Databasanslutningens lås är förgiftat"))
}

/// Tolka ett lagrat datum, fel om det inte går
pub(crate) fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<chrono::NaiveDate> {
    let s: String = row.get(idx)?;
    crate::utils::date::from_db(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("ogiltigt datum: {}", s).into(),
        )
    })
}

/// Tolka ett valfritt lagrat datum
pub(crate) fn optional_date_column(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<chrono::NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    Ok(s.as_deref().and_then(crate::utils::date::from_db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_file_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ops.db");

        let db = Database::open(&path).unwrap();
        let conn = lock(&db.conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
