mod discover;
mod health;
mod register;
mod rotate;
mod system;

pub use discover::{discover_by_name, discover_filtered};
pub use health::{instance_health, report_health};
pub use register::register;
pub use rotate::{decommission, heartbeat, rotate};
pub use system::{health as liveness, not_found, stats};
