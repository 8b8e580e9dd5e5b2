use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::lock;
use crate::models::{Capability, Profile, Role};
use crate::services::access;
use crate::utils::error::AppError;

pub struct ProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_PROFILE: &str =
    "SELECT id, email, full_name, role, department, is_active, created_at FROM profiles";

impl ProfileRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Hämta alla profiler
    pub fn find_all(&self) -> Result<Vec<Profile>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY full_name", SELECT_PROFILE))?;

        let profiles = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(profiles)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Profile>> {
        let conn = lock(&self.conn)?;
        Self::read(&conn, id)
    }

    /// Läs en profil på en redan låst anslutning
    pub(crate) fn read(conn: &Connection, id: i64) -> Result<Option<Profile>> {
        let profile = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_PROFILE),
                [id],
                Self::row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let conn = lock(&self.conn)?;
        let profile = conn
            .query_row(
                &format!("{} WHERE email = ?", SELECT_PROFILE),
                [email.trim()],
                Self::row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Skapa en profil. Aktören måste ha `ManageUsers`.
    pub fn create(&self, actor: &Profile, profile: &mut Profile) -> Result<i64> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::ManageUsers)?;

        let id = Self::insert_row(&tx, profile)?;
        tx.commit()?;
        Ok(id)
    }

    /// Spara en profil utan behörighetskontroll
    pub(crate) fn insert(&self, profile: &mut Profile) -> Result<i64> {
        let conn = lock(&self.conn)?;
        Self::insert_row(&conn, profile)
    }

    fn insert_row(conn: &Connection, profile: &mut Profile) -> Result<i64> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE email = ?)",
            [profile.email.trim()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(AppError::already_exists(format!("Profil {}", profile.email)).into());
        }

        conn.execute(
            "INSERT INTO profiles (email, full_name, role, department, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.email.trim(),
                profile.full_name,
                profile.role.to_string(),
                profile.department,
                profile.is_active,
            ],
        )?;

        let id = conn.last_insert_rowid();
        profile.id = Some(id);
        info!("Skapade profil {} ({})", id, profile.role);

        Ok(id)
    }

    /// Skapa första administratören. Fungerar bara i en tom databas.
    pub fn bootstrap_admin(&self, email: &str, full_name: &str) -> Result<Profile> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        if count > 0 {
            return Err(AppError::already_exists("Det finns redan profiler").into());
        }

        let mut admin = Profile::new(email, full_name, Role::Admin);
        Self::insert_row(&tx, &mut admin)?;
        tx.commit()?;
        Ok(admin)
    }

    /// Aktivera/inaktivera en profil
    pub fn set_active(&self, actor: &Profile, id: i64, active: bool) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManageUsers)?;
        let rows = conn.execute(
            "UPDATE profiles SET is_active = ? WHERE id = ?",
            params![active, id],
        )?;

        if rows == 0 {
            return Err(AppError::not_found(format!("Profil {}", id)).into());
        }

        info!("Profil {} aktiv = {}", id, active);
        Ok(())
    }

    fn row_to_profile(row: &Row) -> rusqlite::Result<Profile> {
        let role: String = row.get(3)?;
        Ok(Profile {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            role: Role::from_db_str(&role),
            department: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
