//! Domain error taxonomy shared by the ledger, the state machine and the
//! HTTP surface.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BattleError {
    #[error("entry amount must be positive")]
    InvalidAmount,

    #[error("expected entry currency {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    #[error("{missing} participant(s) have not deposited their entry fee")]
    IncompleteDeposits { missing: usize },

    #[error("player does not meet the collection holding requirement")]
    NotEligible,

    #[error("submitted squadron hash does not match server state")]
    StateMismatch,

    #[error("escrow for this battle has already been settled")]
    AlreadySettled,

    #[error("placement percentages exceed 100")]
    InvalidSplit,

    #[error("battle is at capacity")]
    CapacityExceeded,

    #[error("battle does not accept this action in its current state")]
    BattleNotJoinable,

    #[error("turn sequence {got} does not match expected {expected}")]
    TurnOutOfOrder { expected: u64, got: u64 },

    #[error("battle not found")]
    BattleNotFound,

    #[error("player is not a participant of this battle")]
    NotAParticipant,

    #[error("participant has been eliminated")]
    Eliminated,

    #[error("caller is not allowed to perform this action")]
    Unauthorized,
}

impl BattleError {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            BattleError::InvalidAmount => "INVALID_AMOUNT",
            BattleError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            BattleError::IncompleteDeposits { .. } => "INCOMPLETE_DEPOSITS",
            BattleError::NotEligible => "NOT_ELIGIBLE",
            BattleError::StateMismatch => "STATE_MISMATCH",
            BattleError::AlreadySettled => "ALREADY_SETTLED",
            BattleError::InvalidSplit => "INVALID_SPLIT",
            BattleError::CapacityExceeded => "CAPACITY_EXCEEDED",
            BattleError::BattleNotJoinable => "BATTLE_NOT_JOINABLE",
            BattleError::TurnOutOfOrder { .. } => "TURN_OUT_OF_ORDER",
            BattleError::BattleNotFound => "BATTLE_NOT_FOUND",
            BattleError::NotAParticipant => "NOT_A_PARTICIPANT",
            BattleError::Eliminated => "ELIMINATED",
            BattleError::Unauthorized => "UNAUTHORIZED",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ResponseError for BattleError {
    fn status_code(&self) -> StatusCode {
        match self {
            BattleError::InvalidAmount
            | BattleError::CurrencyMismatch { .. }
            | BattleError::InvalidSplit => StatusCode::BAD_REQUEST,

            BattleError::NotEligible | BattleError::Unauthorized => StatusCode::FORBIDDEN,

            BattleError::BattleNotFound => StatusCode::NOT_FOUND,

            BattleError::IncompleteDeposits { .. }
            | BattleError::StateMismatch
            | BattleError::AlreadySettled
            | BattleError::CapacityExceeded
            | BattleError::BattleNotJoinable
            | BattleError::TurnOutOfOrder { .. }
            | BattleError::NotAParticipant
            | BattleError::Eliminated => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, BattleError>;
