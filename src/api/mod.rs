//! Public positioning API
//!
//! [`PositionSession`] is the entry point; [`CachedGeocoder`] is an optional
//! companion for turning positions into addresses.

pub mod geocode;
pub mod session;
pub mod types;

pub use geocode::{CachedGeocoder, GeocodeError, GeocodeKey, ReverseGeocoder};
pub use session::PositionSession;
pub use types::{ErrorCallback, ErrorKind, FallbackCause, PositionCallback, SessionError, SessionOptions};
