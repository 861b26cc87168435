// Unit tests for messenger-core internals
// End-to-end dispatcher and transport tests are in integration_tests/

mod config;
mod contract;
mod envelope;
mod registry;
mod store;
