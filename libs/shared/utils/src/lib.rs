pub mod clock;
pub mod fanout;
pub mod state;
pub mod test_utils;
pub mod time;

pub use clock::{Clock, FixedClock, SystemClock};
pub use fanout::{gather_partial, PartialResults, TaskFailure};
pub use state::AppState;
