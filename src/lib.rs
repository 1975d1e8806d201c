//! Payguard - Payment integration hardening toolkit
//!
//! Sits between a merchant application's business logic and its payment
//! provider, hardening the interaction along three failure axes:
//! duplicate outbound operations under retry, forged or mis-parsed
//! webhook deliveries, and state drift from delayed, out-of-order, or
//! missed events.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
