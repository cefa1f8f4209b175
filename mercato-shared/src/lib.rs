//! Types shared across the Mercato crates: event payloads handed to the
//! notification sink and the PII wrapper used to keep contact details out of logs.

pub mod models;
pub mod pii;

pub use models::events;
