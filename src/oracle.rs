// 11.0 oracle.rs: time weighted average step over a short ring of pool observations.
// the lender prices its collateral from this average instead of the spot step.

use crate::step::Pool;
use crate::types::{Estimate, StepId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const OBSERVATION_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: Timestamp,
    pub step: StepId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Observation capacity must be positive")]
    ZeroCapacity,

    #[error("No observation recorded yet")]
    NoObservations,

    #[error("Observation at {new} is older than the last one at {last}")]
    OutOfOrder { last: i64, new: i64 },

    #[error("No observation covers the window from {since} to {now}")]
    EmptyWindow { since: i64, now: i64 },
}

/// Fixed size history of (timestamp, step). Once full, a new observation evicts the oldest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationArray {
    capacity: usize,
    observations: VecDeque<Observation>,
}

impl Default for ObservationArray {
    fn default() -> Self {
        Self {
            capacity: OBSERVATION_CAPACITY,
            observations: VecDeque::with_capacity(OBSERVATION_CAPACITY),
        }
    }
}

impl ObservationArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, OracleError> {
        if capacity == 0 {
            return Err(OracleError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            observations: VecDeque::with_capacity(capacity),
        })
    }

    pub fn push(&mut self, timestamp: Timestamp, step: StepId) -> Result<(), OracleError> {
        if let Some(last) = self.observations.back() {
            if timestamp < last.timestamp {
                return Err(OracleError::OutOfOrder {
                    last: last.timestamp.as_secs(),
                    new: timestamp.as_secs(),
                });
            }
        }
        if self.observations.len() == self.capacity {
            self.observations.pop_front();
        }
        self.observations.push_back(Observation { timestamp, step });
        Ok(())
    }

    /// Records the pool's current step at `now`.
    pub fn record(&mut self, pool: &Pool, now: Timestamp) -> Result<(), OracleError> {
        self.push(now, pool.current_step)
    }

    /// `index` 0 is the oldest observation still held.
    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Average step over `[since, now]`, rounded down. Each observation holds its step until
    /// the next one, the last one until `now`. Time before the oldest observation is not
    /// counted, so `since` far in the past averages over the whole history.
    pub fn twap_step_since(&self, since: Timestamp, now: Timestamp) -> Result<StepId, OracleError> {
        if self.observations.is_empty() {
            return Err(OracleError::NoObservations);
        }

        let mut weighted: i128 = 0;
        let mut covered: i128 = 0;
        let ends = self
            .observations
            .iter()
            .skip(1)
            .map(|next| next.timestamp)
            .chain(std::iter::once(now));

        for (obs, end) in self.observations.iter().zip(ends) {
            let start = obs.timestamp.max(since);
            let end = end.min(now);
            if end <= start {
                continue;
            }
            let seconds = i128::from(end.as_secs() - start.as_secs());
            weighted += seconds * i128::from(obs.step);
            covered += seconds;
        }

        if covered == 0 {
            return Err(OracleError::EmptyWindow {
                since: since.as_secs(),
                now: now.as_secs(),
            });
        }
        // a weighted mean of u16 steps stays in range
        Ok((weighted / covered) as StepId)
    }

    /// Rate of the average step on `pool`'s ladder. `Unknown` if the rate overflows.
    pub fn twap_price_since(&self, pool: &Pool, since: Timestamp, now: Timestamp) -> Result<Estimate, OracleError> {
        let step = self.twap_step_since(since, now)?;
        Ok(pool.rate_at(step).into())
    }
}
