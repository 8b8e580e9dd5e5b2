pub mod date;
pub mod error;
pub mod numeric;
pub mod path;

pub use error::{AppError, AppResult};
pub use numeric::{parse_lenient, NegativeInputPolicy};
