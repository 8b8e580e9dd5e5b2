//! Opsboard - intern verksamhetsdashboard
//!
//! Hållbarhetsredovisning (vatten, el, resor), tillgångar med spårbar
//! utlåning, småkassa och affärspipeline ovanpå en lokal SQLite-databas.

pub mod cli;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-exports
pub use db::Database;
pub use models::*;
pub use services::{Calculator, PeriodFilter, Summary};
pub use utils::{AppError, AppResult};
