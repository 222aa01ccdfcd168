use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

/// Randomized pause between profile lookups so the scraped platform does not
/// see a steady request rhythm.
#[derive(Debug, Clone)]
pub struct Pacer {
    range: Option<(Duration, Duration)>,
}

impl Pacer {
    /// Sleep a uniformly random duration in `[min, max]`. Bounds are swapped
    /// if given out of order.
    pub fn jitter(min: Duration, max: Duration) -> Self {
        let range = if min <= max { (min, max) } else { (max, min) };
        Pacer { range: Some(range) }
    }

    pub fn disabled() -> Self {
        Pacer { range: None }
    }

    pub fn next_delay(&self) -> Duration {
        match self.range {
            None => Duration::ZERO,
            Some((min, max)) if min == max => min,
            Some((min, max)) => rand::thread_rng().gen_range(min..=max),
        }
    }

    pub fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Waiting {:.1}s before next lead", delay.as_secs_f64());
        thread::sleep(delay);
    }
}
