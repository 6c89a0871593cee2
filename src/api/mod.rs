pub mod health;
pub mod routes;

pub use health::{SessionStats, StatsSnapshot};
pub use routes::{router, ApiState};
