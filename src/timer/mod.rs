//! Time sources and the countdown primitive shared by recording and breathing

mod clock;
mod countdown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use countdown::{CountdownTimer, TimerEvent};
