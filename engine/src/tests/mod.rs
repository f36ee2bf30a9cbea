//! Test modules for the engine crate

mod crawler_tests;
mod sampler_tests;
