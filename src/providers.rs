//! Shared provider traits for dependency injection.
//!
//! Time is the only ambient input the core reads besides user input and the
//! network, so it sits behind a trait that tests can replace.

use chrono::{Local, NaiveDateTime};

/// Trait for providing timestamps.
///
/// # Example
///
/// ```
/// use termai::providers::{SystemTimeProvider, TimeProvider};
///
/// let provider = SystemTimeProvider;
/// let now = provider.now();
/// assert!(now.and_utc().timestamp() > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Returns the current local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}

/// Default time provider using the system clock in the local timezone.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Time provider that always returns the same instant.
pub struct FixedTimeProvider(pub NaiveDateTime);

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
