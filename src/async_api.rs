use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use crate::capture::capture_view;
use crate::pool::BufferPool;
use crate::view::Window;
use crate::{CaptureConfig, CaptureOutput, Error, Result};

/// An async-friendly capture facade backed by per-request worker threads.
///
/// Each capture runs on its own dedicated worker so async tasks can await the
/// result without the window handle needing to live inside the runtime.
/// Requests for different targets may run concurrently; they share one buffer
/// pool so released buffers are reused across captures.
#[derive(Clone)]
pub struct Capturer {
    window: Arc<dyn Window>,
    pool: Arc<BufferPool>,
}

impl Capturer {
    /// Create a capturer over the given window handle.
    pub fn new(window: Arc<dyn Window>) -> Self {
        Self {
            window,
            pool: Arc::new(BufferPool::new()),
        }
    }

    /// Capture one node and await the encoded result.
    ///
    /// Cancellation is not supported mid-capture: dropping the returned
    /// future abandons the result, but the worker runs to completion.
    pub async fn capture(&self, config: CaptureConfig) -> Result<CaptureOutput> {
        let (tx, rx) = oneshot::channel();
        let window = Arc::clone(&self.window);
        let pool = Arc::clone(&self.pool);

        thread::spawn(move || {
            let res = capture_view(window.as_ref(), &pool, &config);
            let _ = tx.send(res);
        });

        rx.await
            .map_err(|e| Error::Other(format!("Capture canceled: {}", e)))?
    }

    /// The shared buffer pool (exposed for inspection in tests and
    /// diagnostics).
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}
