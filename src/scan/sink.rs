use tokio::sync::mpsc;

use crate::models::AcceptedResult;

/// Receives each accepted result exactly once. Fire-and-forget: the sink
/// cannot push back on the orchestrator.
pub trait ResultSink: Send + Sync + 'static {
    fn on_accepted(&self, result: &AcceptedResult);
}

impl<F> ResultSink for F
where
    F: Fn(&AcceptedResult) + Send + Sync + 'static,
{
    fn on_accepted(&self, result: &AcceptedResult) {
        self(result)
    }
}

/// Forwards accepted results into an unbounded channel for a UI task to drain.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AcceptedResult>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AcceptedResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn on_accepted(&self, result: &AcceptedResult) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(result.clone());
    }
}
