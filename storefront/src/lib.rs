//! Order/payment core of the storefront backend.
//!
//! The flow with external-service coordination lives here: order creation
//! ([`orders`]), checkout-session initiation against the payment provider
//! ([`gateway`]), idempotent processing of asynchronous payment callbacks
//! ([`callback`]) and confirmation dispatch ([`notify`]). Shared state is
//! held in Postgres ([`pg_storage`]) behind the trait seams in [`storage`].

pub mod api;
pub mod callback;
pub mod emails;
pub mod gateway;
pub mod model;
pub mod notify;
pub mod orders;
pub mod pg_storage;
pub mod storage;
