//! PostgreSQL storage.
//!
//! Every atomic unit runs in one `BEGIN ... COMMIT`. Status transitions are
//! compare-and-swap updates (`WHERE status = <expected>`), so a retried call
//! finds no row to update and reports a conflict instead of applying twice.

mod deposit;
mod event;
mod ledger;
mod result;
mod wallet;
mod withdrawal;

pub use deposit::PgDepositRepository;
pub use event::PgEventRepository;
pub use result::PgResultRepository;
pub use wallet::PgWalletRepository;
pub use withdrawal::PgWithdrawalRepository;

use crate::error::RepositoryError;

/// Map a stored-value parse failure onto a repository error
pub(crate) fn decode<T>(parsed: Result<T, String>) -> Result<T, RepositoryError> {
    parsed.map_err(RepositoryError::Decode)
}

/// BIGINT counters are stored signed; the models hold them as `u32`
pub(crate) fn decode_count(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{} out of range: {}", column, value)))
}
