//! Consecutive-failure circuit breaker for media transfers
//!
//! Failed ids accumulate in a streak. A success proves the origin is healthy,
//! so every id in the streak before it is considered genuinely unavailable
//! and handed back for marking. Reaching the threshold asks the caller to cool
//! down and resets the counter, but keeps the streak open.

/// Failure counter and open streak of failed post ids
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: u32,
    streak: Vec<String>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            streak: Vec::new(),
        }
    }

    /// Records a failed transfer
    ///
    /// # Returns
    ///
    /// `true` if the threshold was reached and the caller should cool down
    pub fn record_failure(&mut self, id: impl Into<String>) -> bool {
        self.streak.push(id.into());
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.consecutive_failures = 0;
            return true;
        }
        false
    }

    /// Records a successful transfer and drains the open streak
    pub fn record_success(&mut self) -> Vec<String> {
        self.consecutive_failures = 0;
        std::mem::take(&mut self.streak)
    }

    /// Closes the breaker at the end of a work-list, returning the open streak
    pub fn finish(self) -> Vec<String> {
        self.streak
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn pending_streak(&self) -> &[String] {
        &self.streak
    }
}
