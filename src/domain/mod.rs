pub mod account;
pub mod amount;
pub mod transaction;

pub use account::AccountBalance;
pub use transaction::{
    LedgerTransaction, NewTransaction, SettleOutcome, TransactionKind, TransactionStatus,
};
