//! Dummy counter driver: produces a cyclic script of plausible cumulative
//! counter values (and `None` "offline" gaps) without talking to any real
//! hardware, used for bring-up and demos. Grounded on
//! `app/dummy/counter.py` in the original implementation: one randomly
//! sized run is generated per segment kind, then the same run is repeated
//! at each point that segment kind recurs in the cycle.

use std::sync::Mutex;

use rand::Rng;

use crate::device::ParamValue;
use crate::error::DeviceError;

struct Inner {
    script: Vec<Option<i64>>,
    index: usize,
    total: i64,
}

/// A driver that cycles through a prebuilt script of production-rate
/// segments, summing consecutive present samples into a running counter,
/// exactly like a real DCNT reading would accumulate.
pub struct DummyCounter {
    inner: Mutex<Inner>,
}

fn run(rng: &mut impl Rng, lo: i64, hi: i64, len_lo: u32, len_hi: u32) -> Vec<Option<i64>> {
    let len = 2 * rng.gen_range(len_lo..=len_hi) as usize;
    (0..len).map(|_| Some(rng.gen_range(lo..=hi))).collect()
}

impl DummyCounter {
    pub fn new() -> Self {
        Self::from_rng(&mut rand::thread_rng())
    }

    fn from_rng(rng: &mut impl Rng) -> Self {
        let work = run(rng, 150, 200, 9, 10);
        let part_work = run(rng, 10, 100, 5, 7);
        let pause = run(rng, 0, 9, 2, 9);
        let stop = run(rng, 0, 9, 11, 20);
        let offline_len = 2 * rng.gen_range(9..=12) as usize;
        let offline: Vec<Option<i64>> = std::iter::repeat(None).take(offline_len).collect();

        let mut script = Vec::new();
        for seg in [
            &offline, &stop, &part_work, &pause, &stop, &work, &pause, &part_work, &work, &stop,
            &work, &stop, &offline,
        ] {
            script.extend_from_slice(seg);
        }

        DummyCounter {
            inner: Mutex::new(Inner {
                script,
                index: 0,
                total: 0,
            }),
        }
    }

    /// Advances the script by one step, summing consecutive present samples
    /// into the running total and wrapping at the end, exactly like
    /// `DummyCounter.read_parameter` in the original Python. An offline tick
    /// is a successful read of an absent value (`Ok(None)`), not a failure:
    /// the original assigns `self.reading.value = None` on this branch
    /// rather than raising.
    pub async fn read_parameter(&self) -> Result<Option<ParamValue>, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        let sample = inner.script[inner.index];
        inner.index += 1;
        if inner.index >= inner.script.len() {
            inner.index = 0;
        }
        match sample {
            None => Ok(None),
            Some(v) => {
                inner.total += v;
                Ok(Some(ParamValue::Count(inner.total.max(0) as u64)))
            }
        }
    }
}

impl Default for DummyCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_and_accumulates() {
        let dummy = DummyCounter::new();
        let mut last_total = 0u64;
        let mut saw_offline = false;
        let mut saw_growth = false;
        for _ in 0..2000 {
            match dummy.read_parameter().await {
                Ok(Some(ParamValue::Count(v))) => {
                    assert!(v >= last_total);
                    if v > last_total {
                        saw_growth = true;
                    }
                    last_total = v;
                }
                Ok(Some(_)) => unreachable!(),
                Ok(None) => saw_offline = true,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(saw_offline, "dummy script should include offline gaps");
        assert!(saw_growth, "dummy script should include production runs");
    }
}
