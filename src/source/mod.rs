//! Platform location source abstraction
//!
//! The session talks to the device only through [`FixSource`]; tests and
//! development builds use [`MockFixSource`].

pub mod error;
pub mod fix_source;
pub mod mock;

pub use error::{RecoveryStrategy, SourceError};
pub use fix_source::{FixEvent, FixRequest, FixSource, FixSubscription, SubscriptionId};
pub use mock::MockFixSource;
