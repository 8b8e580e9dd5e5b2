//! Repository för elperioder och elkoefficienter

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use super::{date_column, lock};
use crate::models::{Capability, ElectricityConfig, ElectricityInput, ElectricityLog, Profile};
use crate::services::access;
use crate::services::calculator::Calculator;
use crate::utils::date::format_date;
use crate::utils::error::AppError;

const SELECT_LOG: &str = "SELECT id, start_date, end_date, building_kwh, allocation_percentage,
            emission_factor_per_kwh, cost_per_kwh, company_kwh, carbon_kg, cost,
            notes, evidence_url, created_at, updated_at
     FROM electricity_logs";

pub struct ElectricityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ElectricityRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Hämta koefficienter. Standardvärden om inget sparats än.
    pub fn load_config(&self) -> Result<ElectricityConfig> {
        let conn = lock(&self.conn)?;
        Self::read_config(&conn)
    }

    pub fn load_config_or_default(&self) -> ElectricityConfig {
        match self.load_config() {
            Ok(config) => config,
            Err(e) => {
                warn!("Kunde inte läsa elkoefficienter, använder standard: {:#}", e);
                ElectricityConfig::default()
            }
        }
    }

    /// Ersätt koefficienterna helt
    pub fn save_config(&self, actor: &Profile, config: &ElectricityConfig) -> Result<()> {
        config.validate()?;

        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::EditSustainabilityConfig)?;
        conn.execute(
            "INSERT OR REPLACE INTO electricity_config (id, allocation_percentage,
                    emission_factor_per_kwh, cost_per_kwh, updated_at)
             VALUES (1, ?1, ?2, ?3, datetime('now'))",
            params![
                config.allocation_percentage,
                config.emission_factor_per_kwh,
                config.cost_per_kwh,
            ],
        )?;

        info!("Elkoefficienter sparade");
        Ok(())
    }

    fn read_config(conn: &Connection) -> Result<ElectricityConfig> {
        let config = conn
            .query_row(
                "SELECT allocation_percentage, emission_factor_per_kwh, cost_per_kwh
                 FROM electricity_config WHERE id = 1",
                [],
                |row| {
                    Ok(ElectricityConfig {
                        allocation_percentage: row.get(0)?,
                        emission_factor_per_kwh: row.get(1)?,
                        cost_per_kwh: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(config.unwrap_or_default())
    }

    /// Spara en period (upsert på start- och slutdatum) med aktuella koefficienter
    pub fn save(
        &self,
        actor: &Profile,
        input: &ElectricityInput,
        calculator: &Calculator,
    ) -> Result<ElectricityLog> {
        input.validate()?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::RecordSustainability)?;

        let config = Self::read_config(&tx)?;
        let log = calculator.electricity_log(input, &config);

        tx.execute(
            "INSERT INTO electricity_logs (start_date, end_date, building_kwh,
                    allocation_percentage, emission_factor_per_kwh, cost_per_kwh,
                    company_kwh, carbon_kg, cost, notes, evidence_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(start_date, end_date) DO UPDATE SET
                building_kwh = excluded.building_kwh,
                allocation_percentage = excluded.allocation_percentage,
                emission_factor_per_kwh = excluded.emission_factor_per_kwh,
                cost_per_kwh = excluded.cost_per_kwh,
                company_kwh = excluded.company_kwh,
                carbon_kg = excluded.carbon_kg,
                cost = excluded.cost,
                notes = excluded.notes,
                evidence_url = excluded.evidence_url,
                updated_at = datetime('now')",
            params![
                format_date(log.start_date),
                format_date(log.end_date),
                log.building_kwh,
                log.config.allocation_percentage,
                log.config.emission_factor_per_kwh,
                log.config.cost_per_kwh,
                log.company_kwh,
                log.carbon_kg,
                log.cost,
                log.notes,
                log.evidence_url,
            ],
        )?;

        let saved = tx
            .query_row(
                &format!("{} WHERE start_date = ?1 AND end_date = ?2", SELECT_LOG),
                params![format_date(log.start_date), format_date(log.end_date)],
                Self::row_to_log,
            )?;

        tx.commit()?;
        info!(
            "Sparade elperiod {} - {} ({:.1} kWh)",
            saved.start_date, saved.end_date, saved.company_kwh
        );

        Ok(saved)
    }

    pub fn find_all(&self) -> Result<Vec<ElectricityLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(&conn, "", params![])
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<ElectricityLog>> {
        let conn = lock(&self.conn)?;
        let log = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_LOG),
                [id],
                Self::row_to_log,
            )
            .optional()?;
        Ok(log)
    }

    /// Perioder som börjar inom intervallet
    pub fn find_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ElectricityLog>> {
        let conn = lock(&self.conn)?;
        Self::query_logs(
            &conn,
            "WHERE start_date BETWEEN ?1 AND ?2",
            params![format_date(from), format_date(to)],
        )
    }

    pub fn delete(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::RecordSustainability)?;
        let rows = conn.execute("DELETE FROM electricity_logs WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Elperiod {}", id)).into());
        }

        info!("Tog bort elperiod {}", id);
        Ok(())
    }

    fn query_logs<P: rusqlite::Params>(
        conn: &Connection,
        where_clause: &str,
        params: P,
    ) -> Result<Vec<ElectricityLog>> {
        let mut stmt = conn.prepare(&format!(
            "{} {} ORDER BY start_date, end_date",
            SELECT_LOG, where_clause
        ))?;
        let logs = stmt
            .query_map(params, Self::row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn row_to_log(row: &Row) -> rusqlite::Result<ElectricityLog> {
        Ok(ElectricityLog {
            id: row.get(0)?,
            start_date: date_column(row, 1)?,
            end_date: date_column(row, 2)?,
            building_kwh: row.get(3)?,
            config: ElectricityConfig {
                allocation_percentage: row.get(4)?,
                emission_factor_per_kwh: row.get(5)?,
                cost_per_kwh: row.get(6)?,
            },
            company_kwh: row.get(7)?,
            carbon_kg: row.get(8)?,
            cost: row.get(9)?,
            notes: row.get(10)?,
            evidence_url: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}
