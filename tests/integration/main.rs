//! Integration tests for runtask

mod cli_tests;
mod common;
mod channel_tests;
mod plugin_tests;
