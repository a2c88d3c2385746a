//! Token-bucket egress shaper.

use std::time::Duration;

use tokio::time::Instant;

/// Seconds of traffic the bucket can hold, i.e. the burst allowance.
pub const BURST_SECONDS: f64 = 2.0;

/// A token bucket shared by all flows on the egress path.
///
/// Tokens are bytes. They accumulate at `rate` bytes per second up to `rate × BURST_SECONDS`.
/// The bucket starts full.
///
/// The bucket does not sleep by itself: [`consume`](Self::consume) returns how long the caller
/// must wait before transmitting. Only one egress path should consume from a bucket.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Refill rate in bytes per second.
    rate: f64,
    /// Bucket size in bytes.
    capacity: f64,
    /// Currently available bytes, in `[0, capacity]`.
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket refilling at `rate` bytes per second. A zero rate is treated as one
    /// byte per second.
    pub fn new(rate: u64) -> Self {
        let rate = rate.max(1) as f64;
        let capacity = rate * BURST_SECONDS;

        Self { rate, capacity, tokens: capacity, last_refill: Instant::now() }
    }

    /// Charges `bytes` against the bucket and returns how long to wait before sending them.
    #[inline]
    pub fn consume(&mut self, bytes: usize) -> Duration {
        self.consume_at(bytes, Instant::now())
    }

    /// Same as [`consume`](Self::consume), against an explicit clock reading.
    ///
    /// If there are not enough tokens, the bucket is emptied and the returned wait covers the
    /// missing bytes at the refill rate, on top of any wait still pending from earlier sends.
    pub fn consume_at(&mut self, bytes: usize, now: Instant) -> Duration {
        self.refill(now);

        let bytes = bytes as f64;
        if self.tokens >= bytes {
            self.tokens -= bytes;
            return Duration::ZERO;
        }

        let missing = bytes - self.tokens;
        self.tokens = 0.0;

        // Tokens refilled until the end of the wait belong to this send, so refilling restarts
        // from there.
        self.last_refill = self.last_refill.max(now) + Duration::from_secs_f64(missing / self.rate);

        self.last_refill - now
    }

    fn refill(&mut self, now: Instant) {
        if now <= self.last_refill {
            return;
        }

        let elapsed = (now - self.last_refill).as_secs_f64();
        self.tokens = self.capacity.min(self.tokens + elapsed * self.rate);
        self.last_refill = now;
    }

    /// Returns the refill rate in bytes per second.
    #[inline]
    pub fn rate(&self) -> u64 {
        self.rate as u64
    }

    /// Returns the bucket size in bytes.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// Returns the tokens currently in the bucket, as of the last refill.
    #[inline]
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
