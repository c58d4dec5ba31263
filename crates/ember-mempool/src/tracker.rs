//! Header tracker and sync gate.
//!
//! Two one-shot initializer loops spawned at startup: the header poller
//! retries the chain-state provider until the first head snapshot lands,
//! and the sync gate polls catch-up status until the node has caught up.
//! Each fires its readiness signal exactly once and exits.

use crate::pool::Mempool;
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Fetch the chain head, retrying every second until it lands or the
/// pool shuts down. Fires the header readiness signal on success.
pub(crate) fn poll_last_header(pool: Arc<Mempool>) {
    let done = pool.shutdown_rx();
    loop {
        match pool.chain().get_last_header() {
            Ok(header) => {
                pool.set_header(header);
                pool.header_ready().notify();
                tracing::info!(height = header.height, "mempool header initialized");
                return;
            }
            Err(err) => {
                tracing::warn!("last header fetch failed, retrying: {}", err);
            }
        }
        match done.recv_timeout(RETRY_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => return,
        }
    }
}

/// Resolve sync status. With `force_accept` the pool is marked synced
/// immediately; otherwise catch-up status is polled every second. The
/// broadcast layer is notified on first catch-up, and the sync readiness
/// signal fires when status is resolved (or shutdown interrupts).
pub(crate) fn check_sync(pool: Arc<Mempool>) {
    if pool.config().force_accept {
        pool.set_synced(true);
        pool.sync_ready().notify();
        tracing::info!("mempool accepting transactions without sync check");
        return;
    }
    let done = pool.shutdown_rx();
    loop {
        match pool.chain().is_caught_up() {
            Ok(true) => {
                pool.set_synced(true);
                pool.broadcaster().notify_sync(true);
                tracing::info!("mempool caught up with the network");
                break;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!("catch-up status query failed: {}", err);
            }
        }
        match done.recv_timeout(RETRY_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
    pool.sync_ready().notify();
}
