//! Kanban-tavla för pipelinen.
//!
//! En dragning blir en [`PendingMove`]. Kortet byter synlig kolumn först
//! när lagringen bekräftat flytten (`commit`); vid fel återställs det
//! (`rollback`). Ett kort kan ha högst en väntande flytt.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use tracing::{info, warn};

use crate::db::PipelineRepository;
use crate::models::{Lead, PipelineStage, Profile};
use crate::utils::error::{AppError, AppResult};

/// Lagringen som bekräftar en flytt
pub trait StageStore {
    fn move_stage(
        &self,
        actor: &Profile,
        lead_id: i64,
        to: PipelineStage,
        note: Option<&str>,
    ) -> Result<Lead>;
}

impl StageStore for PipelineRepository {
    fn move_stage(
        &self,
        actor: &Profile,
        lead_id: i64,
        to: PipelineStage,
        note: Option<&str>,
    ) -> Result<Lead> {
        PipelineRepository::move_stage(self, actor, lead_id, to, note)
    }
}

/// En flytt som väntar på bekräftelse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMove {
    pub lead_id: i64,
    pub from: PipelineStage,
    pub to: PipelineStage,
}

#[derive(Debug, Default)]
pub struct Board {
    cards: BTreeMap<i64, Lead>,
    pending: HashMap<i64, PendingMove>,
}

impl Board {
    /// Bygg tavlan från hämtade leads. Leads utan id hoppas över.
    pub fn new(leads: Vec<Lead>) -> Self {
        let cards = leads
            .into_iter()
            .filter_map(|lead| lead.id.map(|id| (id, lead)))
            .collect();
        Self {
            cards,
            pending: HashMap::new(),
        }
    }

    pub fn card(&self, lead_id: i64) -> Option<&Lead> {
        self.cards.get(&lead_id)
    }

    /// Synliga kort i en kolumn
    pub fn column(&self, stage: PipelineStage) -> Vec<&Lead> {
        self.cards.values().filter(|lead| lead.stage == stage).collect()
    }

    /// Summa uppskattat värde per kolumn
    pub fn column_value(&self, stage: PipelineStage) -> f64 {
        self.column(stage).iter().map(|lead| lead.estimated_value).sum()
    }

    pub fn pending(&self, lead_id: i64) -> Option<&PendingMove> {
        self.pending.get(&lead_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Påbörja en flytt. Den synliga kolumnen ändras inte.
    pub fn begin_move(&mut self, lead_id: i64, to: PipelineStage) -> AppResult<PendingMove> {
        let card = self
            .cards
            .get(&lead_id)
            .ok_or_else(|| AppError::not_found(format!("Lead {}", lead_id)))?;

        if self.pending.contains_key(&lead_id) {
            return Err(AppError::invalid_transition(format!(
                "Lead {} har redan en väntande flytt",
                lead_id
            )));
        }
        if card.stage == to {
            return Err(AppError::invalid_transition(format!(
                "Lead {} ligger redan i {}",
                lead_id, to
            )));
        }

        let pending = PendingMove {
            lead_id,
            from: card.stage,
            to,
        };
        self.pending.insert(lead_id, pending);
        Ok(pending)
    }

    /// Lagringen har bekräftat: visa kortet i den nya kolumnen.
    /// Ett svar för fel lead avvisas och flytten ligger kvar som väntande.
    pub fn commit(&mut self, pending: &PendingMove, acknowledged: Lead) -> AppResult<()> {
        if acknowledged.id != Some(pending.lead_id) {
            return Err(AppError::invalid_transition(format!(
                "Bekräftelsen gäller lead {:?}, väntande flytt gäller {}",
                acknowledged.id, pending.lead_id
            )));
        }
        self.take_pending(pending)?;
        self.cards.insert(pending.lead_id, acknowledged);
        Ok(())
    }

    /// Flytten misslyckades: kortet ligger kvar i ursprungskolumnen
    pub fn rollback(&mut self, pending: &PendingMove) -> AppResult<()> {
        self.take_pending(pending)?;
        if let Some(card) = self.cards.get_mut(&pending.lead_id) {
            card.stage = pending.from;
        }
        Ok(())
    }

    /// Hela dragningen: påbörja, skriv till lagringen och bekräfta eller återställ
    pub fn drop_card<S: StageStore>(
        &mut self,
        store: &S,
        actor: &Profile,
        lead_id: i64,
        to: PipelineStage,
    ) -> Result<()> {
        let pending = self.begin_move(lead_id, to)?;

        let result = store
            .move_stage(actor, lead_id, to, None)
            .and_then(|lead| Ok(self.commit(&pending, lead)?));

        match result {
            Ok(()) => {
                info!("Kort {} flyttat {} -> {}", lead_id, pending.from, pending.to);
                Ok(())
            }
            Err(e) => {
                self.rollback(&pending)?;
                warn!("Flytt av kort {} misslyckades, återställt: {:#}", lead_id, e);
                Err(e)
            }
        }
    }

    fn take_pending(&mut self, pending: &PendingMove) -> AppResult<()> {
        match self.pending.get(&pending.lead_id) {
            Some(current) if current == pending => {
                self.pending.remove(&pending.lead_id);
                Ok(())
            }
            _ => Err(AppError::not_found(format!(
                "Väntande flytt för lead {}",
                pending.lead_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Role;
    use anyhow::anyhow;

    struct FailingStore;

    impl StageStore for FailingStore {
        fn move_stage(&self, _: &Profile, _: i64, _: PipelineStage, _: Option<&str>) -> Result<Lead> {
            Err(anyhow!("nätverksfel"))
        }
    }

    /// Svarar med ett annat lead än det som flyttades
    struct MisroutedStore;

    impl StageStore for MisroutedStore {
        fn move_stage(&self, _: &Profile, lead_id: i64, to: PipelineStage, _: Option<&str>) -> Result<Lead> {
            Ok(lead(lead_id + 1, to))
        }
    }

    fn lead(id: i64, stage: PipelineStage) -> Lead {
        let mut lead = Lead::new(format!("Kund {}", id), 1000.0);
        lead.id = Some(id);
        lead.stage = stage;
        lead
    }

    fn actor() -> Profile {
        Profile::new("s@example.com", "Staff", Role::Staff)
    }

    #[test]
    fn test_pending_move_does_not_change_column() {
        let mut board = Board::new(vec![lead(1, PipelineStage::Prospect)]);
        let pending = board.begin_move(1, PipelineStage::Contacted).unwrap();

        assert_eq!(board.column(PipelineStage::Prospect).len(), 1);
        assert!(board.column(PipelineStage::Contacted).is_empty());
        assert_eq!(board.pending(1), Some(&pending));
    }

    #[test]
    fn test_one_pending_move_per_card() {
        let mut board = Board::new(vec![lead(1, PipelineStage::Prospect)]);
        board.begin_move(1, PipelineStage::Contacted).unwrap();
        assert!(matches!(
            board.begin_move(1, PipelineStage::Won),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_commit_moves_card() {
        let mut board = Board::new(vec![lead(1, PipelineStage::Prospect)]);
        let pending = board.begin_move(1, PipelineStage::Proposal).unwrap();

        board.commit(&pending, lead(1, PipelineStage::Proposal)).unwrap();
        assert_eq!(board.column(PipelineStage::Proposal).len(), 1);
        assert!(!board.has_pending());
        assert!(board.commit(&pending, lead(1, PipelineStage::Proposal)).is_err());
    }

    #[test]
    fn test_commit_rejects_other_lead() {
        let mut board = Board::new(vec![
            lead(1, PipelineStage::Prospect),
            lead(2, PipelineStage::Prospect),
        ]);
        let pending = board.begin_move(1, PipelineStage::Won).unwrap();

        assert!(matches!(
            board.commit(&pending, lead(2, PipelineStage::Won)),
            Err(AppError::InvalidTransition(_))
        ));
        assert_eq!(board.card(1).unwrap().stage, PipelineStage::Prospect);
        assert_eq!(board.card(2).unwrap().stage, PipelineStage::Prospect);
        assert_eq!(board.pending(1), Some(&pending));
    }

    #[test]
    fn test_misrouted_ack_rolls_back() {
        let mut board = Board::new(vec![
            lead(1, PipelineStage::Contacted),
            lead(2, PipelineStage::Prospect),
        ]);

        let err = board
            .drop_card(&MisroutedStore, &actor(), 1, PipelineStage::Proposal)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::InvalidTransition(_))
        ));
        assert_eq!(board.card(1).unwrap().stage, PipelineStage::Contacted);
        assert_eq!(board.card(2).unwrap().stage, PipelineStage::Prospect);
        assert!(!board.has_pending());
    }

    #[test]
    fn test_failed_store_rolls_back() {
        let mut board = Board::new(vec![lead(1, PipelineStage::Negotiation)]);

        let err = board
            .drop_card(&FailingStore, &actor(), 1, PipelineStage::Won)
            .unwrap_err();
        assert!(err.to_string().contains("nätverksfel"));
        assert_eq!(board.card(1).unwrap().stage, PipelineStage::Negotiation);
        assert!(board.column(PipelineStage::Won).is_empty());
        assert!(!board.has_pending());
    }

    #[test]
    fn test_drop_card_with_repository() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let repo = db.pipeline();
        let id = repo.create(&admin, &mut Lead::new("Acme AB", 25000.0)).unwrap();

        let mut board = Board::new(repo.find_all().unwrap());
        board.drop_card(&repo, &admin, id, PipelineStage::Contacted).unwrap();

        assert_eq!(board.column(PipelineStage::Contacted).len(), 1);
        assert_eq!(board.column_value(PipelineStage::Contacted), 25000.0);
        assert_eq!(
            repo.find_by_id(id).unwrap().unwrap().stage,
            PipelineStage::Contacted
        );
    }

    #[test]
    fn test_denied_store_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.profiles().bootstrap_admin("admin@example.com", "Admin").unwrap();
        let repo = db.pipeline();
        let id = repo.create(&admin, &mut Lead::new("Acme AB", 0.0)).unwrap();

        let mut inactive = actor();
        db.profiles().insert(&mut inactive).unwrap();
        db.profiles()
            .set_active(&admin, inactive.id.unwrap(), false)
            .unwrap();

        let mut board = Board::new(repo.find_all().unwrap());
        let err = board
            .drop_card(&repo, &inactive, id, PipelineStage::Won)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::PermissionDenied(_))
        ));
        assert_eq!(board.card(id).unwrap().stage, PipelineStage::Prospect);
    }
}
