//! Test modules for the queue crate

mod local_backend_tests;
mod request_list_tests;
