//! The flusher: a single dedicated thread that serializes every durable
//! write behind one FIFO queue. Committers never touch the backend
//! directly (except in cache-disabled mode, which bypasses this thread
//! entirely) — they hand off a [`FlushTask`] and move on, bounded only by
//! the backpressure check in [`crate::Engine::commit`].
//!
//! A plain `std::thread::spawn` loop reading a `crossbeam-channel`
//! receiver, rather than a tokio task, so this crate makes no assumption
//! about an async runtime being present in the embedding process.

use std::sync::atomic::Ordering;
use std::sync::Weak;
use std::thread::JoinHandle;

use crate::backend::{BackendStorage, TableData};
use crate::engine::EngineState;

pub(crate) struct FlushTask {
    pub block_hash: Vec<u8>,
    pub block_num: u64,
    pub payload: Vec<TableData>,
}

pub(crate) fn spawn<B: BackendStorage>(
    state: Weak<EngineState<B>>,
    rx: crossbeam_channel::Receiver<FlushTask>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("cached-storage-flusher".into())
        .spawn(move || run(state, rx))
        .expect("failed to spawn flusher thread")
}

fn run<B: BackendStorage>(state: Weak<EngineState<B>>, rx: crossbeam_channel::Receiver<FlushTask>) {
    while let Ok(task) = rx.recv() {
        let Some(state) = state.upgrade() else { return };
        let _span = tracing::debug_span!("cached_storage::flusher::run", block_num = task.block_num).entered();
        let Some(backend) = state.backend.read().clone() else {
            tracing::debug!("flusher woke with a queued task but no backend is set; dropping it");
            continue;
        };
        match backend.commit(&task.block_hash, task.block_num, &task.payload) {
            Ok(()) => {
                state.sync_num.fetch_max(task.block_num, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    block_num = task.block_num,
                    "backend commit failed; storage engine is shutting down"
                );
                state.running.store(false, Ordering::SeqCst);
                return;
            }
        }
    }
}
