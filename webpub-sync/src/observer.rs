//! Progress callbacks for a publish run.

use webpub_core::Operation;

use crate::executor::OperationOutcome;
use crate::report::Statistics;

/// Receives progress events while a run executes.
///
/// Every method defaults to a no-op so implementors only override what they
/// render.
pub trait ProgressObserver {
    /// The classified plan, before anything executes.
    fn on_plan(&mut self, _statistics: &Statistics) {}

    /// `position` is 1-based.
    fn on_operation_start(&mut self, _position: usize, _total: usize, _operation: &Operation) {}

    /// Called after each block of a chunked transfer is staged.
    fn on_block_progress(&mut self, _current: u32, _total: u32) {}

    fn on_attempt_failed(
        &mut self,
        _operation: &Operation,
        _attempt: u32,
        _error: &str,
        _will_retry: bool,
    ) {
    }

    fn on_operation_finished(&mut self, _operation: &Operation, _outcome: &OperationOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}
