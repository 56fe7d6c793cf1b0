use rust_decimal::Decimal;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Every outcome an engine operation can fail with. Business-rule
/// rejections are ordinary values returned to the caller; only
/// `InvalidState` signals an internal consistency problem.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("charges against oneself are not allowed")]
    SelfChargeNotAllowed,

    #[error("charge is not pending")]
    ChargeNotPending,

    #[error("only the charge recipient may pay it")]
    NotRecipient,

    #[error("only the charge originator may cancel it")]
    NotOriginator,

    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("originator balance insufficient for reversal: requested {requested}, available {available}")]
    InsufficientFundsForReversal {
        requested: Decimal,
        available: Decimal,
    },

    #[error("card details are incomplete")]
    CardDetailsIncomplete,

    #[error("declined by the external authorizer")]
    AuthorizerDeclined,

    #[error("deposit declined by the external authorizer")]
    DepositDeclined,

    #[error("charge is already cancelled")]
    AlreadyCancelled,

    #[error("paid charge has no recorded payment method")]
    UnknownPaymentMethod,

    #[error("{0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    /// Stable machine-readable identifier for each failure kind. The
    /// presentation layer maps these to transport status codes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::SelfChargeNotAllowed => "SELF_CHARGE_NOT_ALLOWED",
            AppError::ChargeNotPending => "CHARGE_NOT_PENDING",
            AppError::NotRecipient => "NOT_RECIPIENT",
            AppError::NotOriginator => "NOT_ORIGINATOR",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::InsufficientFundsForReversal { .. } => "INSUFFICIENT_FUNDS_FOR_REVERSAL",
            AppError::CardDetailsIncomplete => "CARD_DETAILS_INCOMPLETE",
            AppError::AuthorizerDeclined => "AUTHORIZER_DECLINED",
            AppError::DepositDeclined => "DEPOSIT_DECLINED",
            AppError::AlreadyCancelled => "ALREADY_CANCELLED",
            AppError::UnknownPaymentMethod => "UNKNOWN_PAYMENT_METHOD",
            AppError::Validation(_) => "VALIDATION",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Config(_) => "CONFIG",
            AppError::Http(_) => "HTTP",
        }
    }

    /// True for failures that mean "request rejected by business rule",
    /// as opposed to missing resources or internal faults. These are
    /// never retried automatically.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            AppError::SelfChargeNotAllowed
                | AppError::ChargeNotPending
                | AppError::NotRecipient
                | AppError::NotOriginator
                | AppError::InsufficientBalance { .. }
                | AppError::InsufficientFundsForReversal { .. }
                | AppError::CardDetailsIncomplete
                | AppError::AuthorizerDeclined
                | AppError::DepositDeclined
                | AppError::AlreadyCancelled
                | AppError::UnknownPaymentMethod
        )
    }
}
