//! Run a future to completion from synchronous pipeline code.
//!
//! Pipeline stages are plain blocking calls, but the chat model, the speech
//! engine and the transcoding subprocess are driven by tokio. [`block_on`]
//! picks a strategy based on the runtime (if any) the caller is inside of:
//!
//! - multi-thread runtime: `block_in_place` + `Handle::block_on`, so the
//!   worker thread is handed off instead of stalled
//! - current-thread runtime: the future runs on a scoped helper thread with
//!   its own runtime, because blocking the only runtime thread would deadlock
//! - no runtime: a fresh current-thread runtime on the calling thread

use crate::error::{Result, VoiceError};
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

/// Drive `future` to completion and return its output.
///
/// Never returns before the future has finished. Errors only when a runtime
/// cannot be built or the helper thread panics.
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(move || fresh_runtime().map(|rt| rt.block_on(future)))
                .join()
                .map_err(|_| VoiceError::Runtime {
                    message: "bridged task panicked".to_string(),
                })?
        }),
        Err(_) => Ok(fresh_runtime()?.block_on(future)),
    }
}

fn fresh_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| VoiceError::Runtime {
            message: format!("Failed to build runtime: {e}"),
        })
}
