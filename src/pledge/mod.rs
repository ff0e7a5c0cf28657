//! # Pledge workflow
//!
//! A pledge moves through three steps:
//!
//! 1. [`intake::stage`] validates an amount and optional reward against the
//!    project without writing anything.
//! 2. [`intake::create_payment_authorization`] re-validates the staged pledge
//!    and opens a payment intent with the gateway.
//! 3. [`settlement::confirm_pledge`] re-reads the intent, and only when the
//!    gateway reports it as settled hands the [`VerifiedPayment`] to
//!    [`ledger::finalize`], which records the pledge and its transaction in a
//!    single database transaction.
//!
//! [`VerifiedPayment`]: crate::gateway::VerifiedPayment

pub mod intake;
pub mod ledger;
pub mod settlement;

use sea_orm::{DbErr, SqlErr};

use crate::gateway::GatewayError;
use crate::money::AmountError;

pub use intake::{PledgeState, StagedPledge};
pub use ledger::{FinalizePledge, FinalizedPledge};

#[derive(Debug, thiserror::Error)]
pub enum PledgeError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("payment not completed: {0}")]
    PaymentNotVerified(String),
    #[error("pledge failed: {0}")]
    ConstraintViolation(String),
    #[error("reward no longer available: {0}")]
    ConcurrencyConflict(String),
    #[error("pledge cannot move from {from:?} to {to:?}")]
    IllegalTransition { from: PledgeState, to: PledgeState },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<AmountError> for PledgeError {
    fn from(err: AmountError) -> Self {
        PledgeError::Validation(err.to_string())
    }
}

/// Maps a failed write to `ConstraintViolation` when the store rejected it,
/// leaving every other database error as it is.
pub(crate) fn storage_error(err: DbErr) -> PledgeError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => PledgeError::ConstraintViolation(detail),
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            PledgeError::ConstraintViolation(detail)
        }
        _ if crate::error::is_check_violation(&err) => {
            PledgeError::ConstraintViolation(err.to_string())
        }
        _ => PledgeError::Database(err),
    }
}
