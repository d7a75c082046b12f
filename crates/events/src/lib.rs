//! Gig lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`GigEvent`]: the event envelope.
//! - [`CalendarSync`]: subscriber that mirrors published gigs to a calendar
//!   bridge over HTTP.

pub mod bus;
pub mod calendar;

pub use bus::{EventBus, GigEvent, PublishedGig};
pub use calendar::{CalendarConfig, CalendarDelivery, CalendarSync};
