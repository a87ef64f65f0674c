pub mod common;
pub mod instance_tests;
