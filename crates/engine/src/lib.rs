//! Library surface for the Escriba job-pipeline engine. `main.rs` is a
//! thin binary wiring these modules together; integration tests exercise
//! them directly against an in-memory SQLite store.

pub mod derivation_loop;
pub mod snapshot_loop;
pub mod store;
pub mod transfer_loop;
pub mod webpage_loop;
