//! Synthetic heart rate samples

use rand::Rng;
use std::fmt;

use crate::error::{Error, Result};

/// Lowest heart rate that can be drawn (inclusive)
pub const MIN_BPM: u8 = 60;

/// Upper bound for drawn heart rates (exclusive)
pub const MAX_BPM_EXCLUSIVE: u8 = 100;

/// One heart rate reading in beats per minute, always within [60, 100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeartRateSample(u8);

impl HeartRateSample {
    /// Draw a uniformly distributed sample from the thread-local generator
    pub fn draw() -> Self {
        Self::draw_from(&mut rand::thread_rng())
    }

    /// Draw a uniformly distributed sample from the given generator
    pub fn draw_from<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(MIN_BPM..MAX_BPM_EXCLUSIVE))
    }

    pub fn bpm(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for HeartRateSample {
    type Error = Error;

    fn try_from(bpm: u8) -> Result<Self> {
        if (MIN_BPM..MAX_BPM_EXCLUSIVE).contains(&bpm) {
            Ok(Self(bpm))
        } else {
            Err(Error::InvalidSample(bpm))
        }
    }
}

impl fmt::Display for HeartRateSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
