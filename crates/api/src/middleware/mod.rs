//! Request guards.
//!
//! - [`webhook_guard::webhook_guard`] -- records a [`webhook_guard::WebhookVerdict`]
//!   for each webhook delivery instead of rejecting it.

pub mod webhook_guard;
