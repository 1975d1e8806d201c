//! Stripe adapter - Provider client and thin-event object lookup.

pub mod client;
pub mod object_lookup;

pub use client::{StripeApiConfig, StripeClient, StripeInvoice};
pub use object_lookup::StripeObjectLookup;
