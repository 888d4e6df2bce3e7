//! Blocking waits used between exchanges.
use std::time::Duration;

/// Something that can block the calling thread for a while.
///
/// The pipeline only ever waits for the inter-batch delay and for
/// server-directed `WINNERWAIT` periods; both go through this seam.
pub trait Sleeper {
    fn sleep(&self, d: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, d: Duration) {
        (**self).sleep(d)
    }
}
