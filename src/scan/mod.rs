pub mod controller;
pub mod history;
mod loop_worker;
pub mod orchestrator;
pub mod retry;
pub mod sink;
pub mod state;

pub use controller::ScanController;
pub use history::{HistoryOrder, RecentHistory};
pub use orchestrator::{OrchestratorConfig, ScanOrchestrator};
pub use retry::{RetryLadder, Transform};
pub use sink::{ChannelSink, ResultSink};
pub use state::{SessionState, Verdict};
