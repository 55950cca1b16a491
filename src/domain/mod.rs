//! Domain layer: models and typed errors. No I/O lives here.

pub mod errors;
pub mod models;

pub use errors::{ForemanError, ForemanResult};
