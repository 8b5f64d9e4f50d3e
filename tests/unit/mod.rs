//! Integration test suite exercising the public API.

mod bridge_tests;
mod property_tests;
mod serialization_tests;
