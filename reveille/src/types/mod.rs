mod clock;
mod fallback;

pub use clock::{Clock, SystemClock};
pub use fallback::{Exhausted, first_success, first_success_async};
