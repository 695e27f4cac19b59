pub mod debit;
pub mod topup;

pub use debit::DebitGate;
pub use topup::TopUpCoordinator;
