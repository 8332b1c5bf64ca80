pub mod http;
pub mod router;
pub mod server;
pub mod state;
pub mod subsystems;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
