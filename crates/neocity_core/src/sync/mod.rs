//! # Cross-Thread Transform Sync
//!
//! The one place the core touches another thread.
//!
//! ```text
//! Worker thread:  write inactive page ──► swap (atomic store)
//! Sim thread:     read active page    ◄── acquire load
//! ```
//!
//! No locks on the data path. The supervisor around the worker only uses
//! channels for its control messages.

mod transform_bridge;
mod worker;

pub use transform_bridge::{
    segment_len_bytes, segment_len_words, BridgeReader, BridgeWriter, TransformBridge,
    SAMPLE_WORDS,
};
pub use worker::{
    worker_factory, TransformWorker, WorkerEnvelope, WorkerFactory, WorkerMessage, WorkerState,
    WorkerStats, WorkerSupervisor,
};
