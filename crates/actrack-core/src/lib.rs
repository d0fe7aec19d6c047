//! Actrack core: data models, clock, and storage backends shared by the
//! tracker and its command-line front end.

pub mod clock;
pub mod error;
pub mod models;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
