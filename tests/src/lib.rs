//! # LogBus Test Suite
//!
//! Cross-component scenarios run against the in-memory log store.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── contract.rs        # Test service contract and messages
//! └── integration/
//!     ├── round_trip.rs  # Client/server command-event and request-response
//!     ├── projections.rs # Projection streams merged into client events
//!     └── lifecycle.rs   # Scopes, teardown, failures, filtering
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p logbus-tests
//! cargo test -p logbus-tests integration::round_trip::
//! ```

pub mod contract;
pub mod integration;
