pub mod asset;
pub mod electricity;
pub mod petty_cash;
pub mod pipeline;
pub mod profile;
pub mod settings;
pub mod travel;
pub mod water;

pub use asset::*;
pub use electricity::*;
pub use petty_cash::{CashKind, PettyCashTransaction};
pub use pipeline::*;
pub use profile::*;
pub use settings::*;
pub use travel::*;
pub use water::*;
