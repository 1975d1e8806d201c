//! Adapters - Implementations of the ports.
//!
//! - `memory` - In-memory reference stores
//! - `postgres` - PostgreSQL-backed dedupe store
//! - `stripe` - Stripe API client, object lookup, event feed, refunds
//! - `http` - Axum REST surface

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
