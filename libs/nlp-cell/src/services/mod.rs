pub mod dates;
pub mod parser;
pub mod scheduler;

pub use scheduler::NlpSchedulingService;
