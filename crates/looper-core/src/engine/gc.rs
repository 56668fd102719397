//! Deferred deallocation for sample buffers
//!
//! Sample buffers are replaced wholesale on every load, and the old buffer's
//! last handle is usually dropped inside the audio callback. Freeing a large
//! allocation there can stall the callback, so buffers are wrapped in
//! `basedrop::Shared` and their memory is reclaimed on a background thread.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// How often the collector thread reclaims dropped buffers
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

static COLLECTOR_HANDLE: OnceLock<Handle> = OnceLock::new();
static START_LOCK: Mutex<()> = Mutex::new(());

fn start_collector() -> EngineResult<Handle> {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("looper-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Buffer collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .map_err(|e| EngineError::CollectorUnavailable(e.to_string()))?;

    rx.recv()
        .map_err(|e| EngineError::CollectorUnavailable(e.to_string()))
}

/// Handle used to allocate `Shared<T>` values reclaimed off the audio thread.
///
/// The collector thread is started on first use.
pub fn collector_handle() -> EngineResult<Handle> {
    if let Some(handle) = COLLECTOR_HANDLE.get() {
        return Ok(handle.clone());
    }

    // Serialize startup so concurrent first callers share one thread
    let _guard = START_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = COLLECTOR_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = start_collector()?;
    Ok(COLLECTOR_HANDLE.get_or_init(|| handle).clone())
}
