//! Repository för vattenloggar, veckorapporter och vattenkoefficienter

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use super::{date_column, lock};
use crate::models::{
    Capability, Profile, WaterConfig, WaterDayInput, WaterLog, WaterWeekInput, WeeklyReport,
};
use crate::services::access;
use crate::services::calculator::Calculator;
use crate::utils::date::{format_date, weekdays_of};
use crate::utils::error::AppError;

const SELECT_LOG: &str = "SELECT id, report_id, date, headcount, is_holiday, notes,
            water_liters, carbon_kg, cost, created_at, updated_at
     FROM water_logs";

const SELECT_REPORT: &str = "SELECT id, week_start, hand_wash_frequency_per_day, hand_wash_volume_liters,
            toilet_flush_frequency_per_day, toilet_flush_volume_liters,
            emission_factor_per_cubic_meter, cost_per_cubic_meter, notes, evidence_url,
            total_liters, total_carbon_kg, total_cost, created_at, updated_at
     FROM water_weekly_reports";

pub struct WaterRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WaterRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------
    // Koefficienter
    // ------------------------------------------------------------

    /// Hämta koefficienter. Standardvärden om inget sparats än.
    pub fn load_config(&self) -> Result<WaterConfig> {
        let conn = lock(&self.conn)?;
        Self::read_config(&conn)
    }

    /// Som `load_config`, men ett läsfel ger standardvärden (loggas som varning)
    pub fn load_config_or_default(&self) -> WaterConfig {
        match self.load_config() {
            Ok(config) => config,
            Err(e) => {
                warn!("Kunde inte läsa vattenkoefficienter, använder standard: {:#}", e);
                WaterConfig::default()
            }
        }
    }

    /// Ersätt koefficienterna helt
    pub fn save_config(&self, actor: &Profile, config: &WaterConfig) -> Result<()> {
        config.validate()?;

        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::EditSustainabilityConfig)?;
        conn.execute(
            "INSERT OR REPLACE INTO water_config (id, hand_wash_frequency_per_day, hand_wash_volume_liters,
                    toilet_flush_frequency_per_day, toilet_flush_volume_liters,
                    emission_factor_per_cubic_meter, cost_per_cubic_meter, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
            params![
                config.hand_wash_frequency_per_day,
                config.hand_wash_volume_liters,
                config.toilet_flush_frequency_per_day,
                config.toilet_flush_volume_liters,
                config.emission_factor_per_cubic_meter,
                config.cost_per_cubic_meter,
            ],
        )?;

        info!("Vattenkoefficienter sparade");
        Ok(())
    }

    fn read_config(conn: &Connection) -> Result<WaterConfig> {
        let config = conn
            .query_row(
                "SELECT hand_wash_frequency_per_day, hand_wash_volume_liters,
                        toilet_flush_frequency_per_day, toilet_flush_volume_liters,
                        emission_factor_per_cubic_meter, cost_per_cubic_meter
                 FROM water_config WHERE id = 1",
                [],
                |row| {
                    Ok(WaterConfig {
                        hand_wash_frequency_per_day: row.get(0)?,
                        hand_wash_volume_liters: row.get(1)?,
                        toilet_flush_frequency_per_day: row.get(2)?,
                        toilet_flush_volume_liters: row.get(3)?,
                        emission_factor_per_cubic_meter: row.get(4)?,
                        cost_per_cubic_meter: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(config.unwrap_or_default())
    }

    // ------------------------------------------------------------
    // Veckor
    // ------------------------------------------------------------

    /// Spara en vecka. Befintliga dagar i veckan behåller sina råvärden men
    /// räknas om tillsammans med de nya med de koefficienter som gäller nu,
    /// så att alla dagar matchar rapportens ögonblicksbild.
    pub fn save_week(
        &self,
        actor: &Profile,
        input: &WaterWeekInput,
        calculator: &Calculator,
    ) -> Result<WeeklyReport> {
        input.validate()?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::RecordSustainability)?;

        let config = Self::read_config(&tx)?;
        let days = weekdays_of(input.week_start);
        let week_start = days[0];

        let existing = Self::query_logs(
            &tx,
            "WHERE date BETWEEN ?1 AND ?2",
            params![format_date(days[0]), format_date(days[4])],
        )?;

        let mut inputs: BTreeMap<NaiveDate, WaterDayInput> = existing
            .into_iter()
            .map(|log| {
                (
                    log.date,
                    WaterDayInput {
                        date: log.date,
                        headcount: log.headcount,
                        is_holiday: log.is_holiday,
                        notes: log.notes,
                    },
                )
            })
            .collect();
        for day in &input.days {
            inputs.insert(day.date, day.clone());
        }

        let logs: Vec<WaterLog> = inputs
            .values()
            .map(|day| calculator.water_log(day, &config))
            .collect();

        let total_liters: f64 = logs.iter().map(|l| l.water_liters).sum();
        let total_carbon: f64 = logs.iter().map(|l| l.carbon_kg).sum();
        let total_cost: f64 = logs.iter().map(|l| l.cost).sum();

        tx.execute(
            "INSERT INTO water_weekly_reports (week_start, hand_wash_frequency_per_day,
                    hand_wash_volume_liters, toilet_flush_frequency_per_day,
                    toilet_flush_volume_liters, emission_factor_per_cubic_meter,
                    cost_per_cubic_meter, notes, evidence_url,
                    total_liters, total_carbon_kg, total_cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(week_start) DO UPDATE SET
                hand_wash_frequency_per_day = excluded.hand_wash_frequency_per_day,
                hand_wash_volume_liters = excluded.hand_wash_volume_liters,
                toilet_flush_frequency_per_day = excluded.toilet_flush_frequency_per_day,
                toilet_flush_volume_liters = excluded.toilet_flush_volume_liters,
                emission_factor_per_cubic_meter = excluded.emission_factor_per_cubic_meter,
                cost_per_cubic_meter = excluded.cost_per_cubic_meter,
                notes = excluded.notes,
                evidence_url = excluded.evidence_url,
                total_liters = excluded.total_liters,
                total_carbon_kg = excluded.total_carbon_kg,
                total_cost = excluded.total_cost,
                updated_at = datetime('now')",
            params![
                format_date(week_start),
                config.hand_wash_frequency_per_day,
                config.hand_wash_volume_liters,
                config.toilet_flush_frequency_per_day,
                config.toilet_flush_volume_liters,
                config.emission_factor_per_cubic_meter,
                config.cost_per_cubic_meter,
                input.notes,
                input.evidence_url,
                total_liters,
                total_carbon,
                total_cost,
            ],
        )?;

        let report_id: i64 = tx.query_row(
            "SELECT id FROM water_weekly_reports WHERE week_start = ?",
            [format_date(week_start)],
            |row| row.get(0),
        )?;

        for log in &logs {
            tx.execute(
                "INSERT INTO water_logs (report_id, date, headcount, is_holiday, notes,
                        water_liters, carbon_kg, cost)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(date) DO UPDATE SET
                    report_id = excluded.report_id,
                    headcount = excluded.headcount,
                    is_holiday = excluded.is_holiday,
                    notes = excluded.notes,
                    water_liters = excluded.water_liters,
                    carbon_kg = excluded.carbon_kg,
                    cost = excluded.cost,
                    updated_at = datetime('now')",
                params![
                    report_id,
                    format_date(log.date),
                    log.headcount,
                    log.is_holiday,
                    log.notes,
                    log.water_liters,
                    log.carbon_kg,
                    log.cost,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "Sparade vattenvecka {} ({} dagar, {:.1} l)",
            week_start,
            logs.len(),
            total_liters
        );

        Self::query_report(&conn, "WHERE id = ?1", params![report_id])?
            .ok_or_else(|| AppError::not_found(format!("Veckorapport {}", report_id)).into())
    }

    /// Rapporten för veckan som datumet tillhör
    pub fn find_report_by_week(&self, date: NaiveDate) -> Result<Option<WeeklyReport>> {
        let conn = lock(&self.conn)?;
        let monday = weekdays_of(date)[0];
        Self::query_report(&conn, "WHERE week_start = ?1", params![format_date(monday)])
    }

    pub fn find_all_reports(&self) -> Result<Vec<WeeklyReport>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY week_start", SELECT_REPORT))?;
        let reports = stmt
            .query_map([], Self::row_to_report)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reports)
    }

    /// Ta bort en veckorapport och dess dagar
    pub fn delete_report(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::RecordSustainability)?;
        let rows = conn.execute("DELETE FROM water_weekly_reports WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Veckorapport {}", id)).into());
        }

        info!("Tog bort veckorapport {}", id);
        Ok(())
    }

    // ------------------------------------------------------------
    // Dagar
    // ------------------------------------------------------------

    pub fn find_all_logs(&self) -> Result<Vec<WaterLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(&conn, "", params![])
    }

    pub fn find_logs_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<WaterLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(
            &conn,
            "WHERE date BETWEEN ?1 AND ?2",
            params![format_date(from), format_date(to)],
        )
    }

    pub fn logs_for_report(&self, report_id: i64) -> Result<Vec<WaterLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(&conn, "WHERE report_id = ?1", params![report_id])
    }

    /// Ta bort en enskild dag och uppdatera veckans summor
    pub fn delete_log(&self, actor: &Profile, id: i64) -> Result<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::RecordSustainability)?;

        let report_id: Option<Option<i64>> = tx
            .query_row("SELECT report_id FROM water_logs WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(report_id) = report_id else {
            return Err(AppError::not_found(format!("Vattenlogg {}", id)).into());
        };

        tx.execute("DELETE FROM water_logs WHERE id = ?", [id])?;

        if let Some(report_id) = report_id {
            tx.execute(
                "UPDATE water_weekly_reports SET
                    total_liters = (SELECT COALESCE(SUM(water_liters), 0) FROM water_logs WHERE report_id = ?1),
                    total_carbon_kg = (SELECT COALESCE(SUM(carbon_kg), 0) FROM water_logs WHERE report_id = ?1),
                    total_cost = (SELECT COALESCE(SUM(cost), 0) FROM water_logs WHERE report_id = ?1),
                    updated_at = datetime('now')
                 WHERE id = ?1",
                [report_id],
            )?;
        }

        tx.commit()?;
        info!("Tog bort vattenlogg {}", id);
        Ok(())
    }

    fn query_logs<P: rusqlite::Params>(
        conn: &Connection,
        where_clause: &str,
        params: P,
    ) -> Result<Vec<WaterLog>> {
        let mut stmt = conn.prepare(&format!("{} {} ORDER BY date", SELECT_LOG, where_clause))?;
        let logs = stmt
            .query_map(params, Self::row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn query_report<P: rusqlite::Params>(
        conn: &Connection,
        where_clause: &str,
        params: P,
    ) -> Result<Option<WeeklyReport>> {
        let report = conn
            .query_row(
                &format!("{} {}", SELECT_REPORT, where_clause),
                params,
                Self::row_to_report,
            )
            .optional()?;
        Ok(report)
    }

    fn row_to_log(row: &Row) -> rusqlite::Result<WaterLog> {
        Ok(WaterLog {
            id: row.get(0)?,
            report_id: row.get(1)?,
            date: date_column(row, 2)?,
            headcount: row.get(3)?,
            is_holiday: row.get(4)?,
            notes: row.get(5)?,
            water_liters: row.get(6)?,
            carbon_kg: row.get(7)?,
            cost: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn row_to_report(row: &Row) -> rusqlite::Result<WeeklyReport> {
        Ok(WeeklyReport {
            id: row.get(0)?,
            week_start: date_column(row, 1)?,
            config: WaterConfig {
                hand_wash_frequency_per_day: row.get(2)?,
                hand_wash_volume_liters: row.get(3)?,
                toilet_flush_frequency_per_day: row.get(4)?,
                toilet_flush_volume_liters: row.get(5)?,
                emission_factor_per_cubic_meter: row.get(6)?,
                cost_per_cubic_meter: row.get(7)?,
            },
            notes: row.get(8)?,
            evidence_url: row.get(9)?,
            total_liters: row.get(10)?,
            total_carbon_kg: row.get(11)?,
            total_cost: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Role;
    use crate::services::calculator;

    const EPS: f64 = 1e-9;

    fn setup() -> (Database, Profile) {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        (db, admin)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    fn cfg_a() -> WaterConfig {
        WaterConfig {
            hand_wash_frequency_per_day: 4.0,
            hand_wash_volume_liters: 1.5,
            toilet_flush_frequency_per_day: 3.0,
            toilet_flush_volume_liters: 6.0,
            emission_factor_per_cubic_meter: 0.5,
            cost_per_cubic_meter: 10.0,
        }
    }

    #[test]
    fn test_load_config_defaults_when_missing() {
        let (db, _) = setup();
        assert_eq!(db.water().load_config().unwrap(), WaterConfig::default());
        assert_eq!(db.water().load_config_or_default(), WaterConfig::default());
    }

    #[test]
    fn test_save_config_replaces() {
        let (db, admin) = setup();
        let repo = db.water();

        repo.save_config(&admin, &cfg_a()).unwrap();
        assert_eq!(repo.load_config().unwrap(), cfg_a());

        let mut cfg_b = cfg_a();
        cfg_b.emission_factor_per_cubic_meter = 0.9;
        repo.save_config(&admin, &cfg_b).unwrap();
        assert_eq!(repo.load_config().unwrap(), cfg_b);
    }

    #[test]
    fn test_save_config_rejects_invalid_and_unauthorized() {
        let (db, admin) = setup();
        let repo = db.water();

        let mut bad = cfg_a();
        bad.hand_wash_volume_liters = -2.0;
        let err = repo.save_config(&admin, &bad).unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::Validation(_))));

        let mut staff = Profile::new("s@example.com", "Staff", Role::Staff);
        db.profiles().insert(&mut staff).unwrap();
        let err = repo.save_config(&staff, &cfg_a()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_save_week_computes_logs() {
        let (db, admin) = setup();
        let repo = db.water();
        repo.save_config(&admin, &cfg_a()).unwrap();

        let tuesday = monday().succ_opt().unwrap();
        let input = WaterWeekInput::new(
            monday(),
            vec![WaterDayInput::new(monday(), 10), WaterDayInput::holiday(tuesday)],
        );
        let report = repo.save_week(&admin, &input, &Calculator::default()).unwrap();

        // 10 personer * (4*1.5 + 3*6) = 240 l
        assert!((report.total_liters - 240.0).abs() < EPS);
        assert!((report.total_carbon_kg - 0.12).abs() < EPS);
        assert_eq!(report.config, cfg_a());

        let logs = repo.logs_for_report(report.id.unwrap()).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].water_liters, 0.0);
        assert!(logs[1].is_holiday);
    }

    #[test]
    fn test_config_change_does_not_alter_saved_logs() {
        let (db, admin) = setup();
        let repo = db.water();
        repo.save_config(&admin, &cfg_a()).unwrap();

        let input = WaterWeekInput::new(monday(), vec![WaterDayInput::new(monday(), 10)]);
        repo.save_week(&admin, &input, &Calculator::default()).unwrap();
        let before = repo.find_all_logs().unwrap();

        let mut cfg_b = cfg_a();
        cfg_b.toilet_flush_volume_liters = 9.0;
        cfg_b.emission_factor_per_cubic_meter = 2.0;
        repo.save_config(&admin, &cfg_b).unwrap();

        let after = repo.find_all_logs().unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].water_liters, before[0].water_liters);
        assert_eq!(after[0].carbon_kg, before[0].carbon_kg);

        let report = repo.find_report_by_week(monday()).unwrap().unwrap();
        assert_eq!(report.config, cfg_a());
        let expected = calculator::water(10.0, false, &report.config);
        assert!((after[0].water_liters - expected.liters).abs() < EPS);
    }

    #[test]
    fn test_resave_week_recomputes_all_days_with_current_config() {
        let (db, admin) = setup();
        let repo = db.water();
        repo.save_config(&admin, &cfg_a()).unwrap();

        let tuesday = monday().succ_opt().unwrap();
        let first = WaterWeekInput::new(monday(), vec![WaterDayInput::new(monday(), 10)]);
        repo.save_week(&admin, &first, &Calculator::default()).unwrap();

        let mut cfg_b = cfg_a();
        cfg_b.hand_wash_frequency_per_day = 2.0;
        repo.save_config(&admin, &cfg_b).unwrap();

        let second = WaterWeekInput::new(monday(), vec![WaterDayInput::new(tuesday, 5)]);
        let report = repo.save_week(&admin, &second, &Calculator::default()).unwrap();

        let logs = repo.logs_for_report(report.id.unwrap()).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(report.config, cfg_b);
        for log in &logs {
            let expected = calculator::water(log.headcount as f64, log.is_holiday, &report.config);
            assert!((log.water_liters - expected.liters).abs() < EPS);
        }
        let sum: f64 = logs.iter().map(|l| l.water_liters).sum();
        assert!((report.total_liters - sum).abs() < EPS);
    }

    #[test]
    fn test_upsert_by_date() {
        let (db, admin) = setup();
        let repo = db.water();

        let input = WaterWeekInput::new(monday(), vec![WaterDayInput::new(monday(), 10)]);
        repo.save_week(&admin, &input, &Calculator::default()).unwrap();
        let input = WaterWeekInput::new(monday(), vec![WaterDayInput::new(monday(), 20)]);
        repo.save_week(&admin, &input, &Calculator::default()).unwrap();

        let logs = repo.find_all_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].headcount, 20);
        assert_eq!(repo.find_all_reports().unwrap().len(), 1);
    }

    #[test]
    fn test_find_logs_between() {
        let (db, admin) = setup();
        let repo = db.water();

        let wednesday = monday() + chrono::Duration::days(2);
        let input = WaterWeekInput::new(
            monday(),
            vec![WaterDayInput::new(monday(), 10), WaterDayInput::new(wednesday, 12)],
        );
        repo.save_week(&admin, &input, &Calculator::default()).unwrap();

        let logs = repo.find_logs_between(monday(), monday().succ_opt().unwrap()).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].date, monday());
        assert_eq!(repo.find_logs_between(monday(), wednesday).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_log_updates_totals() {
        let (db, admin) = setup();
        let repo = db.water();

        let tuesday = monday().succ_opt().unwrap();
        let input = WaterWeekInput::new(
            monday(),
            vec![WaterDayInput::new(monday(), 10), WaterDayInput::new(tuesday, 10)],
        );
        let report = repo.save_week(&admin, &input, &Calculator::default()).unwrap();
        let logs = repo.logs_for_report(report.id.unwrap()).unwrap();

        repo.delete_log(&admin, logs[0].id.unwrap()).unwrap();

        let reloaded = repo.find_report_by_week(monday()).unwrap().unwrap();
        assert!((reloaded.total_liters - logs[1].water_liters).abs() < EPS);
        assert!(repo.delete_log(&admin, 9999).is_err());
    }

    #[test]
    fn test_delete_report_cascades() {
        let (db, admin) = setup();
        let repo = db.water();

        let input = WaterWeekInput::new(monday(), vec![WaterDayInput::new(monday(), 10)]);
        let report = repo.save_week(&admin, &input, &Calculator::default()).unwrap();
        repo.delete_report(&admin, report.id.unwrap()).unwrap();

        assert!(repo.find_all_logs().unwrap().is_empty());
    }
}
