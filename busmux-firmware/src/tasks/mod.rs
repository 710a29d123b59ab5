//! Embassy async tasks
//!
//! Each task locks the bus it needs for one sampling pass and releases it
//! before waiting again.

pub mod analog;
pub mod counter;
pub mod heartbeat;
pub mod report;
pub mod uart_bridge;

pub use analog::analog_task;
pub use counter::counter_task;
pub use heartbeat::heartbeat_task;
pub use report::report_task;
pub use uart_bridge::uart_bridge_task;
