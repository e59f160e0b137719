pub mod slots;
pub mod suggestions;

pub use suggestions::SuggestionService;
