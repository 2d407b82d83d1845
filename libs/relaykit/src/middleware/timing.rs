use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::chain::{Next, UnaryOutboundMiddleware};
use crate::context::CallContext;
use crate::error::RpcError;
use crate::procedure::method_name;
use crate::transport::{Request, Response};

/// One observation made by [`TimingMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRecord {
    pub method: String,
    pub procedure: String,
    /// Whole milliseconds, truncated.
    pub elapsed_ms: u64,
    pub success: bool,
}

/// Destination of timing records.
pub trait TimingRecorder: Send + Sync {
    fn record(&self, record: TimingRecord);
}

/// Writes one log line per call: `method=<name> elapsed_ms=<n>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimingRecorder;

impl TimingRecorder for LogTimingRecorder {
    fn record(&self, record: TimingRecord) {
        tracing::info!(
            target: "relaykit::timing",
            method = %record.method,
            procedure = %record.procedure,
            elapsed_ms = record.elapsed_ms,
            success = record.success,
            "method={} elapsed_ms={}",
            record.method,
            record.elapsed_ms
        );
    }
}

/// Measures the wall-clock duration of every outbound call.
///
/// Pure observer: the downstream response or error is returned unchanged and
/// exactly one record is emitted per call.
#[derive(Clone)]
pub struct TimingMiddleware {
    recorder: Arc<dyn TimingRecorder>,
}

impl TimingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::with_recorder(Arc::new(LogTimingRecorder))
    }

    #[must_use]
    pub fn with_recorder(recorder: Arc<dyn TimingRecorder>) -> Self {
        Self { recorder }
    }
}

impl Default for TimingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl UnaryOutboundMiddleware for TimingMiddleware {
    async fn call(
        &self,
        ctx: &CallContext,
        request: Request,
        next: Next<'_>,
    ) -> Result<Response, RpcError> {
        let procedure = request.procedure.clone();
        let start = Instant::now();
        let result = next.run(ctx, request).await;
        let elapsed_ms = elapsed_ms(start);

        self.recorder.record(TimingRecord {
            method: method_name(&procedure).to_owned(),
            procedure,
            elapsed_ms,
            success: result.is_ok(),
        });

        result
    }
}
