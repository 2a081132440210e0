use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use crate::error::{HotspotError, Result};

/// Shutdown flag shared with the signal handler. The handler only stores
/// into it; the control thread polls it between phases.
pub type CancelFlag = Arc<AtomicBool>;

pub fn new_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(cancel: Option<&CancelFlag>) -> bool {
    cancel.map(|flag| flag.load(Ordering::Relaxed)).unwrap_or(false)
}

pub fn check_cancel(cancel: Option<&CancelFlag>) -> Result<()> {
    if is_cancelled(cancel) {
        return Err(HotspotError::Cancelled);
    }
    Ok(())
}

/// Sleeps in 100ms ticks, returning early with `Cancelled` once the flag is set.
pub fn cancel_sleep(cancel: Option<&CancelFlag>, duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return check_cancel(cancel);
    }

    let start = Instant::now();
    let tick = Duration::from_millis(100);
    while start.elapsed() < duration {
        check_cancel(cancel)?;
        let remaining = duration.saturating_sub(start.elapsed());
        std::thread::sleep(tick.min(remaining));
    }
    Ok(())
}
