//! Simulated glitch target for development and tests.
//!
//! Models a chip with one hidden vulnerable window in the parameter space:
//! settings inside the window leak the protected payload, settings in a
//! halo around it crash the target, everything else boots normally.

use crate::hw::{ResponseSource, TriggerSink};
use crate::space::ParameterPoint;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimTargetConfig {
    pub success_width: (u64, u64),
    pub success_offset: (u64, u64),
    /// Extra margin around the success window that produces crashes.
    pub crash_halo_ns: u64,
    /// Probability that an in-window trial actually succeeds.
    pub success_rate: f64,
    pub seed: u64,
}

impl Default for SimTargetConfig {
    fn default() -> Self {
        Self {
            success_width: (110, 130),
            success_offset: (3400, 3600),
            crash_halo_ns: 100,
            success_rate: 1.0,
            seed: 0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    configured: Option<ParameterPoint>,
    pending: Vec<u8>,
    rng: StdRng,
    configure_count: u32,
    fire_count: u32,
}

/// In-process target implementing both hardware roles.
#[derive(Debug)]
pub struct SimTarget {
    config: SimTargetConfig,
    state: Mutex<SimState>,
}

impl SimTarget {
    pub fn new(config: SimTargetConfig) -> Self {
        let seed = config.seed;
        Self {
            config,
            state: Mutex::new(SimState {
                configured: None,
                pending: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
                configure_count: 0,
                fire_count: 0,
            }),
        }
    }

    pub fn fire_count(&self) -> u32 {
        self.lock().fire_count
    }

    pub fn configure_count(&self) -> u32 {
        self.lock().configure_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn in_window(&self, point: ParameterPoint) -> bool {
        let (wmin, wmax) = self.config.success_width;
        let (omin, omax) = self.config.success_offset;
        (wmin..=wmax).contains(&point.width_ns) && (omin..=omax).contains(&point.offset_ns)
    }

    fn in_halo(&self, point: ParameterPoint) -> bool {
        let halo = self.config.crash_halo_ns;
        let (wmin, wmax) = self.config.success_width;
        let (omin, omax) = self.config.success_offset;
        (wmin.saturating_sub(halo)..=wmax + halo).contains(&point.width_ns)
            && (omin.saturating_sub(halo)..=omax + halo).contains(&point.offset_ns)
    }

    fn response_for(&self, point: ParameterPoint, roll: f64) -> &'static [u8] {
        if self.in_window(point) && roll < self.config.success_rate {
            b"flag{v0ltage_drop_wins}\r\n"
        } else if self.in_halo(point) {
            b"HARD FAULT: core reset\r\n"
        } else {
            b"Boot OK\r\nRDP level 1 active\r\n"
        }
    }
}

impl Default for SimTarget {
    fn default() -> Self {
        Self::new(SimTargetConfig::default())
    }
}

#[async_trait]
impl TriggerSink for SimTarget {
    async fn configure(&self, point: ParameterPoint) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.configured = Some(point);
        state.configure_count += 1;
        Ok(())
    }

    async fn fire(&self) -> anyhow::Result<()> {
        let mut state = self.lock();
        let Some(point) = state.configured else {
            anyhow::bail!("fire before configure");
        };
        state.fire_count += 1;
        let roll = state.rng.gen::<f64>();
        let response = self.response_for(point, roll);
        state.pending.extend_from_slice(response);
        Ok(())
    }
}

#[async_trait]
impl ResponseSource for SimTarget {
    async fn read(&self, max_bytes: usize, _timeout: Duration) -> anyhow::Result<Vec<u8>> {
        let mut state = self.lock();
        let n = state.pending.len().min(max_bytes);
        Ok(state.pending.drain(..n).collect())
    }
}
