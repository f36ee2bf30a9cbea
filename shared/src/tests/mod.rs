//! Test modules for the shared crate

mod error_tests;
mod request_source_tests;
mod utils_tests;
