//! Abstraction seams (currently just the clock).

pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};
