//! Prelude module for convenient imports.
//!
//! ```rust
//! use twdt::prelude::*;
//! ```

pub use crate::config::{WdtConfig, WdtConfigBuilder};
pub use crate::controller::{RunState, SubscriptionStatus, TaskWatchdog};
pub use crate::entity::{CoreMask, Identity, TaskId, UserHandle};
pub use crate::error::{TwdtError, TwdtResult};
pub use crate::idle::{IdleHook, IdleHookTable};
pub use crate::metrics::TwdtMetrics;
pub use crate::platform::{AbortHandler, HostPlatform, IdleLoop, Platform};
pub use crate::report::ReportSink;
pub use crate::subscription::{TaskSubscription, UserSubscription};
