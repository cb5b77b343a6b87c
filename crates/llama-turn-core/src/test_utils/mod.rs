pub mod fake_api;
pub mod mock_stack_server;

pub use fake_api::*;
pub use mock_stack_server::*;
