//! Repository för resaktiviteter, resesträckor och utsläppsfaktorer

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use super::{date_column, lock};
use crate::models::{
    ActivityTotals, Capability, Profile, TransportMode, TravelActivity, TravelEmissionConfig,
    TravelLog, TravelSegmentInput,
};
use crate::services::access;
use crate::services::calculator::Calculator;
use crate::utils::date::format_date;
use crate::utils::error::AppError;

const SELECT_ACTIVITY: &str =
    "SELECT id, title, description, activity_date, created_by, created_at, updated_at
     FROM travel_activities";

const SELECT_LOG: &str = "SELECT id, activity_id, travel_date, origin, destination,
            transport_mode, transport_subtype, distance_km, passenger_count,
            emission_factor_per_km, emission_kg, notes, evidence_url, created_at
     FROM travel_logs";

pub struct TravelRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TravelRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------
    // Faktorer
    // ------------------------------------------------------------

    /// Hämta faktortabellen. Tom tabell betyder att inget har sparats
    /// och ger standardfaktorerna; en sparad tabell är aldrig tom.
    pub fn load_config(&self) -> Result<TravelEmissionConfig> {
        let conn = lock(&self.conn)?;
        Self::read_config(&conn)
    }

    pub fn load_config_or_default(&self) -> TravelEmissionConfig {
        match self.load_config() {
            Ok(config) => config,
            Err(e) => {
                warn!("Kunde inte läsa resefaktorer, använder standard: {:#}", e);
                TravelEmissionConfig::default()
            }
        }
    }

    /// Ersätt hela faktortabellen
    pub fn save_config(&self, actor: &Profile, config: &TravelEmissionConfig) -> Result<()> {
        config.validate()?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::EditSustainabilityConfig)?;

        tx.execute("DELETE FROM travel_emission_config", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO travel_emission_config (mode_key, emission_factor_per_km)
                 VALUES (?1, ?2)",
            )?;
            for (key, factor) in &config.factors {
                stmt.execute(params![key, factor])?;
            }
        }

        tx.commit()?;
        info!("Resefaktorer sparade ({} st)", config.factors.len());
        Ok(())
    }

    fn read_config(conn: &Connection) -> Result<TravelEmissionConfig> {
        let mut stmt =
            conn.prepare("SELECT mode_key, emission_factor_per_km FROM travel_emission_config")?;
        let factors = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        if factors.is_empty() {
            return Ok(TravelEmissionConfig::default());
        }
        Ok(TravelEmissionConfig { factors })
    }

    // ------------------------------------------------------------
    // Aktiviteter
    // ------------------------------------------------------------

    pub fn create_activity(&self, actor: &Profile, activity: &mut TravelActivity) -> Result<i64> {
        activity.validate()?;

        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::RecordSustainability)?;
        conn.execute(
            "INSERT INTO travel_activities (title, description, activity_date, created_by)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                activity.title.trim(),
                activity.description,
                format_date(activity.activity_date),
                actor.id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        activity.id = Some(id);
        activity.created_by = actor.id;
        info!("Skapade resaktivitet {}: {}", id, activity.title);

        Ok(id)
    }

    pub fn find_activity(&self, id: i64) -> Result<Option<TravelActivity>> {
        let conn = lock(&self.conn)?;
        let activity = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_ACTIVITY),
                [id],
                Self::row_to_activity,
            )
            .optional()?;
        Ok(activity)
    }

    pub fn find_all_activities(&self) -> Result<Vec<TravelActivity>> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare(&format!("{} ORDER BY activity_date DESC, id DESC", SELECT_ACTIVITY))?;
        let activities = stmt
            .query_map([], Self::row_to_activity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(activities)
    }

    /// Ta bort en aktivitet med alla dess sträckor
    pub fn delete_activity(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::RecordSustainability)?;
        let rows = conn.execute("DELETE FROM travel_activities WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Resaktivitet {}", id)).into());
        }

        info!("Tog bort resaktivitet {}", id);
        Ok(())
    }

    // ------------------------------------------------------------
    // Sträckor
    // ------------------------------------------------------------

    /// Lägg till en sträcka. Faktorn som används sparas på raden.
    pub fn add_segment(
        &self,
        actor: &Profile,
        activity_id: i64,
        input: &TravelSegmentInput,
        calculator: &Calculator,
    ) -> Result<TravelLog> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::RecordSustainability)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM travel_activities WHERE id = ?)",
            [activity_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::not_found(format!("Resaktivitet {}", activity_id)).into());
        }

        let config = Self::read_config(&tx)?;
        let mut log = calculator.travel_log(activity_id, input, &config);

        tx.execute(
            "INSERT INTO travel_logs (activity_id, travel_date, origin, destination,
                    transport_mode, transport_subtype, distance_km, passenger_count,
                    emission_factor_per_km, emission_kg, notes, evidence_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                log.activity_id,
                format_date(log.travel_date),
                log.origin,
                log.destination,
                log.transport_mode.to_string(),
                log.transport_subtype,
                log.distance_km,
                log.passenger_count,
                log.emission_factor_per_km,
                log.emission_kg,
                log.notes,
                log.evidence_url,
            ],
        )?;
        log.id = Some(tx.last_insert_rowid());

        tx.execute(
            "UPDATE travel_activities SET updated_at = datetime('now') WHERE id = ?",
            [activity_id],
        )?;

        tx.commit()?;
        info!(
            "Ny sträcka för aktivitet {}: {} {:.1} km, {:.2} kg",
            activity_id, log.transport_mode, log.distance_km, log.emission_kg
        );

        Ok(log)
    }

    pub fn logs_for_activity(&self, activity_id: i64) -> Result<Vec<TravelLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(&conn, "WHERE activity_id = ?1", params![activity_id])
    }

    pub fn activity_totals(&self, activity_id: i64) -> Result<ActivityTotals> {
        Ok(ActivityTotals::from_logs(&self.logs_for_activity(activity_id)?))
    }

    pub fn find_all_logs(&self) -> Result<Vec<TravelLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(&conn, "", params![])
    }

    pub fn find_logs_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TravelLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(
            &conn,
            "WHERE travel_date BETWEEN ?1 AND ?2",
            params![format_date(from), format_date(to)],
        )
    }

    pub fn delete_log(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::RecordSustainability)?;
        let rows = conn.execute("DELETE FROM travel_logs WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Resesträcka {}", id)).into());
        }

        info!("Tog bort resesträcka {}", id);
        Ok(())
    }

    fn query_logs<P: rusqlite::Params>(
        conn: &Connection,
        where_clause: &str,
        params: P,
    ) -> Result<Vec<TravelLog>> {
        let mut stmt = conn.prepare(&format!(
            "{} {} ORDER BY travel_date, id",
            SELECT_LOG, where_clause
        ))?;
        let logs = stmt
            .query_map(params, Self::row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn row_to_activity(row: &Row) -> rusqlite::Result<TravelActivity> {
        Ok(TravelActivity {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            activity_date: date_column(row, 3)?,
            created_by: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn row_to_log(row: &Row) -> rusqlite::Result<TravelLog> {
        let mode: String = row.get(5)?;
        Ok(TravelLog {
            id: row.get(0)?,
            activity_id: row.get(1)?,
            travel_date: date_column(row, 2)?,
            origin: row.get(3)?,
            destination: row.get(4)?,
            transport_mode: TransportMode::from_db_str(&mode).unwrap_or(TransportMode::Other),
            transport_subtype: row.get(6)?,
            distance_km: row.get(7)?,
            passenger_count: row.get(8)?,
            emission_factor_per_km: row.get(9)?,
            emission_kg: row.get(10)?,
            notes: row.get(11)?,
            evidence_url: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Role;

    const EPS: f64 = 1e-9;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup() -> (Database, Profile) {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        (db, admin)
    }

    #[test]
    fn test_empty_table_gives_defaults() {
        let (db, _) = setup();
        assert_eq!(db.travel().load_config().unwrap(), TravelEmissionConfig::default());
    }

    #[test]
    fn test_save_config_replaces_table() {
        let (db, admin) = setup();
        let repo = db.travel();

        let mut factors = BTreeMap::new();
        factors.insert("train".to_string(), 0.01);
        repo.save_config(&admin, &TravelEmissionConfig { factors }).unwrap();

        let loaded = repo.load_config().unwrap();
        assert_eq!(loaded.factors.len(), 1);
        assert_eq!(loaded.factor_for(TransportMode::Train, None), 0.01);
        assert_eq!(loaded.factor_for(TransportMode::Car, None), 0.0);
    }

    #[test]
    fn test_save_config_rejects_bad_keys_and_empty_table() {
        let (db, admin) = setup();
        let repo = db.travel();

        let mut config = TravelEmissionConfig::default();
        config.factors.insert("car:Diesel".to_string(), 0.9);
        let err = repo.save_config(&admin, &config).unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::Validation(_))));

        let empty = TravelEmissionConfig {
            factors: BTreeMap::new(),
        };
        let err = repo.save_config(&admin, &empty).unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::Validation(_))));

        assert_eq!(repo.load_config().unwrap(), TravelEmissionConfig::default());
    }

    #[test]
    fn test_staff_cannot_edit_factors() {
        let (db, _) = setup();
        let mut staff = Profile::new("s@example.com", "Staff", Role::Staff);
        db.profiles().insert(&mut staff).unwrap();
        let err = db
            .travel()
            .save_config(&staff, &TravelEmissionConfig::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_shared_car_segment_splits_emission() {
        let (db, admin) = setup();
        let repo = db.travel();

        let mut activity = TravelActivity::new("Kundbesök Göteborg", d(2024, 5, 6));
        let activity_id = repo.create_activity(&admin, &mut activity).unwrap();

        let mut segment = TravelSegmentInput::new(d(2024, 5, 6), TransportMode::Car, 100.0);
        segment.passenger_count = 4;
        let log = repo
            .add_segment(&admin, activity_id, &segment, &Calculator::default())
            .unwrap();

        assert!((log.emission_kg - 100.0 * 0.17 / 4.0).abs() < EPS);
        assert_eq!(log.emission_factor_per_km, 0.17);
        assert!(log.id.is_some());
    }

    #[test]
    fn test_factor_change_keeps_saved_segment() {
        let (db, admin) = setup();
        let repo = db.travel();

        let mut activity = TravelActivity::new("Konferens", d(2024, 9, 2));
        let activity_id = repo.create_activity(&admin, &mut activity).unwrap();
        let segment = TravelSegmentInput::new(d(2024, 9, 2), TransportMode::Train, 400.0);
        let saved = repo
            .add_segment(&admin, activity_id, &segment, &Calculator::default())
            .unwrap();

        let mut config = TravelEmissionConfig::default();
        config.set_factor(TransportMode::Train, None, 1.0);
        repo.save_config(&admin, &config).unwrap();

        let logs = repo.logs_for_activity(activity_id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].emission_kg, saved.emission_kg);
        assert_eq!(logs[0].emission_factor_per_km, 0.035);
    }

    #[test]
    fn test_segment_for_missing_activity() {
        let (db, admin) = setup();
        let segment = TravelSegmentInput::new(d(2024, 1, 1), TransportMode::Bus, 10.0);
        let err = db
            .travel()
            .add_segment(&admin, 999, &segment, &Calculator::default())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::NotFound(_))));
    }

    #[test]
    fn test_find_logs_between() {
        let (db, admin) = setup();
        let repo = db.travel();

        let mut activity = TravelActivity::new("Kundbesök", d(2024, 4, 1));
        let activity_id = repo.create_activity(&admin, &mut activity).unwrap();
        for date in [d(2024, 4, 1), d(2024, 4, 20)] {
            let segment = TravelSegmentInput::new(date, TransportMode::Train, 50.0);
            repo.add_segment(&admin, activity_id, &segment, &Calculator::default())
                .unwrap();
        }

        let april_start = repo.find_logs_between(d(2024, 4, 1), d(2024, 4, 10)).unwrap();
        assert_eq!(april_start.len(), 1);
        assert_eq!(april_start[0].travel_date, d(2024, 4, 1));
    }

    #[test]
    fn test_totals_and_cascade_delete() {
        let (db, admin) = setup();
        let repo = db.travel();

        let mut activity = TravelActivity::new("Mässa", d(2024, 3, 4));
        let activity_id = repo.create_activity(&admin, &mut activity).unwrap();
        for km in [120.0, 80.0] {
            let segment = TravelSegmentInput::new(d(2024, 3, 4), TransportMode::Bus, km);
            repo.add_segment(&admin, activity_id, &segment, &Calculator::default())
                .unwrap();
        }

        let totals = repo.activity_totals(activity_id).unwrap();
        assert_eq!(totals.segments, 2);
        assert!((totals.distance_km - 200.0).abs() < EPS);
        assert!((totals.emission_kg - 20.0).abs() < EPS);

        repo.delete_activity(&admin, activity_id).unwrap();
        assert!(repo.find_all_logs().unwrap().is_empty());
        assert!(repo.find_activity(activity_id).unwrap().is_none());
    }
}
