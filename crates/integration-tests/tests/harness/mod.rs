#![allow(dead_code)]

pub mod config;
pub mod mock_llm;
pub mod requests;
pub mod session;

/// Route client logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
