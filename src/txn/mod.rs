pub mod transaction;
pub mod transaction_manager;

pub use transaction::{IsolationLevel, Transaction, TransactionState};
pub use transaction_manager::TransactionManager;
