//! Sweep Runtime
//!
//! Owns the Tokio runtime that expiration timers are spawned on.

use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error};

use crate::config::Config;

/// Runtime shared by every table in the process.
static SWEEP_RUNTIME: OnceLock<Option<Runtime>> = OnceLock::new();

/// Returns a handle to spawn expiration timers on.
///
/// Timers always run on a process-wide multi-threaded runtime built once from
/// [`Config::from_env`], never on the caller's runtime: a table outlives
/// whatever runtime happened to be current when it was created. Returns
/// `None` only when that runtime cannot be built, in which case tables keep
/// working but never sweep.
pub(crate) fn sweep_handle() -> Option<Handle> {
    SWEEP_RUNTIME
        .get_or_init(|| build_sweep_runtime(&Config::from_env()))
        .as_ref()
        .map(|runtime| runtime.handle().clone())
}

fn build_sweep_runtime(config: &Config) -> Option<Runtime> {
    match Builder::new_multi_thread()
        .worker_threads(config.sweep_workers)
        .thread_name(config.sweep_thread_name.clone())
        .enable_time()
        .build()
    {
        Ok(runtime) => {
            debug!(workers = config.sweep_workers, "Started sweep runtime");
            Some(runtime)
        }
        Err(err) => {
            error!(error = %err, "Failed to start sweep runtime, expiration disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_handle_without_ambient_runtime() {
        let handle = sweep_handle().expect("sweep runtime should start");
        let value = handle.block_on(async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            42
        });
        assert_eq!(value, 42);
        assert!(sweep_handle().is_some());
    }

    #[test]
    fn test_handle_outlives_caller_runtime() {
        let caller = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let handle = caller.block_on(async { sweep_handle() }).unwrap();
        drop(caller);

        let (tx, rx) = std::sync::mpsc::channel();
        handle.spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = tx.send(7);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 7);
    }
}
