//! Reusable test utilities:
//! - Mock slowmode executor with scripted failures
//! - Common test data

// Allow unused code in test fixtures - not every test uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_executor;
pub mod test_data;
pub mod test_store;

// Re-export commonly used items
pub use mock_executor::{MockExecutor, RecordedCall};
pub use test_data::*;
pub use test_store::temp_store;
