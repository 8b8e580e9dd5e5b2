//! Repository för operativa tillgångar och deras granskningslogg

use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::info;

use super::{lock, optional_date_column};
use crate::models::{
    Asset, AssetAction, AssetCondition, AssetLog, AssetLogDraft, AssetLogKind, AssetStatus,
    Capability, Profile,
};
use crate::services::access;
use crate::utils::error::AppError;

const SELECT_ASSET: &str = "SELECT id, code, name, category, condition, status, location,
            purchase_date, purchase_value, current_value, current_holder_id, notes,
            created_at, updated_at
     FROM operational_assets";

pub struct AssetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssetRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Hämta alla tillgångar
    pub fn find_all(&self) -> Result<Vec<Asset>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY code", SELECT_ASSET))?;

        let assets = stmt
            .query_map([], Self::row_to_asset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(assets)
    }

    pub fn find_by_status(&self, status: AssetStatus) -> Result<Vec<Asset>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} WHERE status = ? ORDER BY code", SELECT_ASSET))?;

        let assets = stmt
            .query_map([status.to_string()], Self::row_to_asset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(assets)
    }

    /// Tillgångar som en viss person har hand om
    pub fn find_by_holder(&self, holder_id: i64) -> Result<Vec<Asset>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE current_holder_id = ? ORDER BY code",
            SELECT_ASSET
        ))?;

        let assets = stmt
            .query_map([holder_id], Self::row_to_asset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(assets)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Asset>> {
        let conn = lock(&self.conn)?;
        Self::read_asset(&conn, id)
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<Asset>> {
        let conn = lock(&self.conn)?;
        let asset = conn
            .query_row(
                &format!("{} WHERE code = ?", SELECT_ASSET),
                [code.trim()],
                Self::row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    /// Skapa en tillgång tillsammans med dess första loggrad
    pub fn create(&self, actor: &Profile, asset: &mut Asset) -> Result<i64> {
        asset.validate()?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::ManageAssets)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM operational_assets WHERE code = ?)",
            [asset.code.trim()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(AppError::already_exists(format!("Tillgång {}", asset.code)).into());
        }

        tx.execute(
            "INSERT INTO operational_assets (code, name, category, condition, status,
                    location, purchase_date, purchase_value, current_value,
                    current_holder_id, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                asset.code.trim(),
                asset.name,
                asset.category,
                asset.condition.to_string(),
                asset.status.to_string(),
                asset.location,
                asset.purchase_date.map(crate::utils::date::format_date),
                asset.purchase_value,
                asset.current_value,
                asset.current_holder_id,
                asset.notes,
            ],
        )?;

        let id = tx.last_insert_rowid();
        Self::insert_log(&tx, id, &AssetLogDraft::creation(asset), actor.id, None)?;
        tx.commit()?;

        asset.id = Some(id);
        info!("Skapade tillgång {} ({})", asset.code, id);

        Ok(id)
    }

    /// Lämna ut tillgången till en medarbetare
    pub fn assign(
        &self,
        actor: &Profile,
        id: i64,
        employee_id: i64,
        note: Option<&str>,
    ) -> Result<Asset> {
        self.perform(actor, id, &AssetAction::Assign { employee_id }, note)
    }

    pub fn return_asset(&self, actor: &Profile, id: i64, note: Option<&str>) -> Result<Asset> {
        self.perform(actor, id, &AssetAction::Return, note)
    }

    pub fn update_condition(
        &self,
        actor: &Profile,
        id: i64,
        condition: AssetCondition,
        note: Option<&str>,
    ) -> Result<Asset> {
        self.perform(actor, id, &AssetAction::UpdateCondition { condition }, note)
    }

    pub fn update_values(
        &self,
        actor: &Profile,
        id: i64,
        purchase_value: f64,
        current_value: f64,
        note: Option<&str>,
    ) -> Result<Asset> {
        self.perform(
            actor,
            id,
            &AssetAction::UpdateValues {
                purchase_value,
                current_value,
            },
            note,
        )
    }

    pub fn set_status(
        &self,
        actor: &Profile,
        id: i64,
        status: AssetStatus,
        note: Option<&str>,
    ) -> Result<Asset> {
        self.perform(actor, id, &AssetAction::SetStatus { status }, note)
    }

    /// Tillämpa en åtgärd: uppdaterad rad och loggrad skrivs i samma transaktion
    pub fn perform(
        &self,
        actor: &Profile,
        id: i64,
        action: &AssetAction,
        note: Option<&str>,
    ) -> Result<Asset> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::ManageAssets)?;

        let mut asset = Self::read_asset(&tx, id)?
            .ok_or_else(|| AppError::not_found(format!("Tillgång {}", id)))?;

        if let AssetAction::Assign { employee_id } = action {
            let holder_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ? AND is_active = 1)",
                [employee_id],
                |row| row.get(0),
            )?;
            if !holder_exists {
                return Err(AppError::not_found(format!("Aktiv profil {}", employee_id)).into());
            }
        }

        let draft = asset.apply(action)?;

        tx.execute(
            "UPDATE operational_assets SET
                condition = ?1, status = ?2, purchase_value = ?3, current_value = ?4,
                current_holder_id = ?5, updated_at = datetime('now')
             WHERE id = ?6",
            params![
                asset.condition.to_string(),
                asset.status.to_string(),
                asset.purchase_value,
                asset.current_value,
                asset.current_holder_id,
                id,
            ],
        )?;
        Self::insert_log(&tx, id, &draft, actor.id, note)?;

        tx.commit()?;
        info!("{}: {} -> {}", asset.code, draft.kind, asset.status);

        Ok(asset)
    }

    /// Hård borttagning; loggraderna följer med
    pub fn delete(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManageAssets)?;
        let rows = conn.execute("DELETE FROM operational_assets WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Tillgång {}", id)).into());
        }

        info!("Tog bort tillgång {}", id);
        Ok(())
    }

    /// Granskningsloggen i den ordning raderna skrevs
    pub fn logs_for(&self, asset_id: i64) -> Result<Vec<AssetLog>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, asset_id, kind, actor_id, previous_holder_id, new_holder_id,
                    previous_condition, new_condition, note, created_at
             FROM operational_asset_logs
             WHERE asset_id = ?
             ORDER BY id",
        )?;

        let logs = stmt
            .query_map([asset_id], Self::row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(logs)
    }

    fn read_asset(conn: &Connection, id: i64) -> Result<Option<Asset>> {
        let asset = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_ASSET),
                [id],
                Self::row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    fn insert_log(
        tx: &Transaction,
        asset_id: i64,
        draft: &AssetLogDraft,
        actor_id: Option<i64>,
        note: Option<&str>,
    ) -> Result<()> {
        tx.execute(
            "INSERT INTO operational_asset_logs (asset_id, kind, actor_id,
                    previous_holder_id, new_holder_id, previous_condition, new_condition, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                asset_id,
                draft.kind.to_string(),
                actor_id,
                draft.previous_holder_id,
                draft.new_holder_id,
                draft.previous_condition.map(|c| c.to_string()),
                draft.new_condition.map(|c| c.to_string()),
                note,
            ],
        )?;
        Ok(())
    }

    fn row_to_asset(row: &Row) -> rusqlite::Result<Asset> {
        let condition: String = row.get(4)?;
        let status: String = row.get(5)?;

        Ok(Asset {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            condition: AssetCondition::from_db_str(&condition).unwrap_or_default(),
            status: AssetStatus::from_db_str(&status).unwrap_or_default(),
            location: row.get(6)?,
            purchase_date: optional_date_column(row, 7)?,
            purchase_value: row.get(8)?,
            current_value: row.get(9)?,
            current_holder_id: row.get(10)?,
            notes: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn row_to_log(row: &Row) -> rusqlite::Result<AssetLog> {
        let kind: String = row.get(2)?;
        let previous_condition: Option<String> = row.get(6)?;
        let new_condition: Option<String> = row.get(7)?;

        Ok(AssetLog {
            id: row.get(0)?,
            asset_id: row.get(1)?,
            kind: AssetLogKind::from_db_str(&kind).unwrap_or(AssetLogKind::Update),
            actor_id: row.get(3)?,
            previous_holder_id: row.get(4)?,
            new_holder_id: row.get(5)?,
            previous_condition: previous_condition.as_deref().and_then(AssetCondition::from_db_str),
            new_condition: new_condition.as_deref().and_then(AssetCondition::from_db_str),
            note: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}
