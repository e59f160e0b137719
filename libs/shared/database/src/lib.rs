pub mod memory;
pub mod store;
pub mod supabase;

pub use memory::{FailurePoint, InMemoryStore};
pub use store::{AppointmentQuery, PatternQuery, ProviderFilter, SchedulingStore, SuggestionQuery};
pub use supabase::{SupabaseClient, SupabaseSchedulingStore};
