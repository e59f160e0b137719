pub mod detection;

pub use detection::PatternService;
