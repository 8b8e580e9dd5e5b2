//! Tjänster för Opsboard
//!
//! Innehåller affärslogik som inte hör hemma i CLI eller databas.

pub mod access;
pub mod aggregator;
pub mod board;
pub mod calculator;
pub mod export;
pub mod user_admin;

pub use aggregator::{PeriodEntry, PeriodFilter, Summary};
pub use board::{Board, PendingMove, StageStore};
pub use calculator::Calculator;
pub use export::{ExportFormat, ExportResult, ExportService, ReportType, Tabular};
pub use user_admin::{NewUser, UserAdminService};
