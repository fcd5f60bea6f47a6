//! Estimate of the server's clock from ping/pong round trips.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    /// `server - local`, ms.
    offset: f64,
    round_trip: f64,
}

/// Averages the last few offset samples. Each sample assumes the pong was stamped halfway
/// through the round trip.
#[derive(Debug, Clone)]
pub struct ServerClock {
    samples: VecDeque<Sample>,
    window: usize,
}

impl ServerClock {
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window.max(1)),
            window: window.max(1),
        }
    }

    /// Records a pong. `client_time` is the local time echoed back, `now` the local time
    /// of arrival.
    pub fn on_pong(&mut self, client_time: f64, server_time: f64, now: f64) {
        let round_trip = (now - client_time).max(0.0);
        let offset = server_time + round_trip / 2.0 - now;
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { offset, round_trip });
    }

    pub fn is_synced(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn offset(&self) -> f64 {
        self.average(|s| s.offset)
    }

    /// Mean round trip over the window, ms.
    pub fn latency(&self) -> f64 {
        self.average(|s| s.round_trip)
    }

    /// Estimated server time at local time `local_now`. Before the first pong the local
    /// clock is used as is.
    pub fn server_now(&self, local_now: f64) -> f64 {
        local_now + self.offset()
    }

    fn average(&self, field: impl Fn(&Sample) -> f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(field).sum::<f64>() / self.samples.len() as f64
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
