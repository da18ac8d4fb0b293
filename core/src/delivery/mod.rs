// Delivery module: retry state machine, orchestrator, leave broadcast, confirmations

pub mod confirm;
pub mod leave;
pub mod machine;
pub mod orchestrator;

pub use leave::LeaveReport;
pub use machine::{transition, DeliveryEvent, DeliveryState, RetryPolicy, Step};
pub use orchestrator::DeliveryOrchestrator;
