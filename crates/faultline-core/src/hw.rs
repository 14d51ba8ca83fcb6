//! Collaborator contracts for the trigger and monitoring hardware.
//!
//! Wire-level protocol backends live outside this crate; the engine only
//! sees these two traits. Each implementation is single-owner for the
//! duration of one campaign run.

use crate::space::ParameterPoint;
use async_trait::async_trait;
use std::time::Duration;

/// Emits glitch pulses. `configure` must be idempotent for a repeated point;
/// `fire` is fire-and-forget (its physical effect is observed only through
/// the response stream).
#[async_trait]
pub trait TriggerSink: Send + Sync {
    async fn configure(&self, point: ParameterPoint) -> anyhow::Result<()>;
    async fn fire(&self) -> anyhow::Result<()>;
}

/// Sole channel for outcome classification. `read` never errors for
/// "no data": it returns an empty buffer once `timeout` elapses.
#[async_trait]
pub trait ResponseSource: Send + Sync {
    async fn read(&self, max_bytes: usize, timeout: Duration) -> anyhow::Result<Vec<u8>>;
}
