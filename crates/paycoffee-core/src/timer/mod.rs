mod countdown;
mod slots;

pub use countdown::{
    duration_or_default, format_mm_ss, parse_duration, CountdownStatus, CountdownTimer,
    TimerState, DEFAULT_DURATION_SECS, EXPIRED_DISPLAY,
};
pub use slots::{next_tick, DelaySlot, TaskSlot};
