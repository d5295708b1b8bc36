//! Deterministic, date-keyed ordering of the feed.
//!
//! Everyone who opens the feed on the same calendar day sees the same order
//! without any server coordination: the seed is a hash of the local date and
//! the permutation is a Fisher-Yates shuffle driven by Mulberry32.

use chrono::{Local, NaiveDate};

/// Mulberry32 pseudo-random generator. Pure 32-bit integer arithmetic, so
/// the sequence is identical on every platform.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// Return a shuffled copy of `items`. The input is left untouched.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: u32) -> Vec<T> {
    let mut shuffled = items.to_vec();
    let mut rng = Mulberry32::new(seed);

    for i in (1..shuffled.len()).rev() {
        let j = (rng.next_f64() * (i + 1) as f64).floor() as usize;
        shuffled.swap(i, j);
    }

    shuffled
}

/// 32-bit string hash of the `YYYY-MM-DD` rendering of `date`.
pub fn date_seed(date: NaiveDate) -> u32 {
    date.format("%Y-%m-%d")
        .to_string()
        .bytes()
        .fold(0u32, |hash, byte| {
            hash.wrapping_mul(31).wrapping_add(u32::from(byte))
        })
}

/// Seed for the process-local notion of today.
pub fn today_seed() -> u32 {
    date_seed(Local::now().date_naive())
}
