//! Domain models for the ledger.
//!
//! Wallets and transactions form the ledger proper; deposits, withdrawals,
//! match results and events are the workflows that move money through it.

pub mod deposit;
pub mod event;
pub mod match_result;
pub mod page;
pub mod payment;
pub mod wallet;
pub mod withdrawal;

// Re-export all models for convenient access
pub use deposit::{Deposit, DepositStatus};
pub use event::{
    Event, EventKind, EventPrizeState, EventType, NewWinner, PaymentConfirmation, PaymentStatus,
    PrizeStatus, Winner,
};
pub use match_result::{
    MatchResult, PerformanceReport, ResultStatus, VerificationDecision, VerificationRecord,
};
pub use page::{Page, PageRequest};
pub use payment::{is_valid_mobile_number, PaymentMethod};
pub use wallet::{
    check_amount, max_amount, EntityRef, LedgerEntry, MetaValue, Metadata, Transaction,
    TransactionCategory, TransactionKind, TransactionStatus, TransferReceipt, Wallet,
};
pub use withdrawal::{
    AccountDetails, Withdrawal, WithdrawalDecision, WithdrawalRefund, WithdrawalStats,
    WithdrawalStatus,
};
