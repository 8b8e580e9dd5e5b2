//! Repository för pipeline-leads och deras flytthistorik

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::lock;
use crate::models::{Capability, Lead, LeadActivity, PipelineStage, Profile};
use crate::services::access;
use crate::utils::error::AppError;

const SELECT_LEAD: &str = "SELECT id, company_name, contact_name, estimated_value, stage,
            owner_id, notes, created_at, updated_at
     FROM pipeline_leads";

pub struct PipelineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PipelineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn find_all(&self) -> Result<Vec<Lead>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY updated_at DESC, id", SELECT_LEAD))?;

        let leads = stmt
            .query_map([], Self::row_to_lead)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(leads)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Lead>> {
        let conn = lock(&self.conn)?;
        let lead = conn
            .query_row(&format!("{} WHERE id = ?", SELECT_LEAD), [id], Self::row_to_lead)
            .optional()?;
        Ok(lead)
    }

    /// Skapa en lead; första aktivitetsraden skrivs samtidigt
    pub fn create(&self, actor: &Profile, lead: &mut Lead) -> Result<i64> {
        lead.validate()?;

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::ManagePipeline)?;

        tx.execute(
            "INSERT INTO pipeline_leads (company_name, contact_name, estimated_value, stage,
                    owner_id, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                lead.company_name.trim(),
                lead.contact_name,
                lead.estimated_value,
                lead.stage.to_string(),
                lead.owner_id,
                lead.notes,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO pipeline_lead_activities (lead_id, actor_id, from_stage, to_stage)
             VALUES (?1, ?2, NULL, ?3)",
            params![id, actor.id, lead.stage.to_string()],
        )?;

        tx.commit()?;
        lead.id = Some(id);
        info!("Ny lead {}: {}", id, lead.company_name);

        Ok(id)
    }

    /// Flytta en lead till en annan kolumn. Uppdatering och aktivitetsrad
    /// skrivs i samma transaktion.
    pub fn move_stage(
        &self,
        actor: &Profile,
        id: i64,
        to: PipelineStage,
        note: Option<&str>,
    ) -> Result<Lead> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        access::require(&tx, actor, Capability::ManagePipeline)?;

        let mut lead = tx
            .query_row(&format!("{} WHERE id = ?", SELECT_LEAD), [id], Self::row_to_lead)
            .optional()?
            .ok_or_else(|| AppError::not_found(format!("Lead {}", id)))?;

        let from = lead.stage;
        if from == to {
            return Ok(lead);
        }

        tx.execute(
            "UPDATE pipeline_leads SET stage = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![to.to_string(), id],
        )?;
        tx.execute(
            "INSERT INTO pipeline_lead_activities (lead_id, actor_id, from_stage, to_stage, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, actor.id, from.to_string(), to.to_string(), note],
        )?;

        tx.commit()?;
        lead.stage = to;
        info!("Lead {}: {} -> {}", id, from, to);

        Ok(lead)
    }

    pub fn activities(&self, lead_id: i64) -> Result<Vec<LeadActivity>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, lead_id, actor_id, from_stage, to_stage, note, created_at
             FROM pipeline_lead_activities
             WHERE lead_id = ?
             ORDER BY id",
        )?;

        let activities = stmt
            .query_map([lead_id], |row| {
                let from: Option<String> = row.get(3)?;
                let to: String = row.get(4)?;
                Ok(LeadActivity {
                    id: row.get(0)?,
                    lead_id: row.get(1)?,
                    actor_id: row.get(2)?,
                    from_stage: from.as_deref().and_then(PipelineStage::from_db_str),
                    to_stage: PipelineStage::from_db_str(&to).unwrap_or_default(),
                    note: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(activities)
    }

    pub fn delete(&self, actor: &Profile, id: i64) -> Result<()> {
        let conn = lock(&self.conn)?;
        access::require(&conn, actor, Capability::ManagePipeline)?;
        let rows = conn.execute("DELETE FROM pipeline_leads WHERE id = ?", [id])?;
        if rows == 0 {
            return Err(AppError::not_found(format!("Lead {}", id)).into());
        }

        info!("Tog bort lead {}", id);
        Ok(())
    }

    fn row_to_lead(row: &Row) -> rusqlite::Result<Lead> {
        let stage: String = row.get(4)?;
        Ok(Lead {
            id: row.get(0)?,
            company_name: row.get(1)?,
            contact_name: row.get(2)?,
            estimated_value: row.get(3)?,
            stage: PipelineStage::from_db_str(&stage).unwrap_or_default(),
            owner_id: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_move_stage_writes_activity() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let repo = db.pipeline();

        let id = repo.create(&admin, &mut Lead::new("Acme AB", 50000.0)).unwrap();
        let moved = repo
            .move_stage(&admin, id, PipelineStage::Proposal, Some("Offert skickad"))
            .unwrap();
        assert_eq!(moved.stage, PipelineStage::Proposal);

        let activities = repo.activities(id).unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[1].from_stage, Some(PipelineStage::Prospect));
        assert_eq!(activities[1].to_stage, PipelineStage::Proposal);
        assert_eq!(activities[1].note.as_deref(), Some("Offert skickad"));
    }

    #[test]
    fn test_move_to_same_stage_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let repo = db.pipeline();

        let id = repo.create(&admin, &mut Lead::new("Acme AB", 0.0)).unwrap();
        repo.move_stage(&admin, id, PipelineStage::Prospect, None).unwrap();
        assert_eq!(repo.activities(id).unwrap().len(), 1);
    }

    #[test]
    fn test_move_unknown_lead() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();

        let err = db
            .pipeline()
            .move_stage(&admin, 12, PipelineStage::Won, None)
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::NotFound(_))));
    }
}
