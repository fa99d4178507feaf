//! Session lifecycle: initialization, retry with backoff, health checks.

pub mod clock;
pub mod machine;
pub mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{LinkState, RetryPolicy};
pub use manager::{LifecycleConfig, LifecycleHandle, Session, spawn};
