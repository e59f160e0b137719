pub mod error;
pub mod scheduling;
pub mod time_format;

pub use error::{AppError, SchedulingError};
