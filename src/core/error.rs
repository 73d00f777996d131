use thiserror::Error;

/// Input problems caught before any period is simulated.
///
/// Budget shortfalls and non-convergence are not errors; they come back as
/// [`Outcome`](super::Outcome) values on the report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("at least one account is required")]
    NoAccounts,
    #[error("account id `{0}` appears more than once")]
    DuplicateAccountId(String),
    #[error("account `{id}`: {field} must be a finite number")]
    NonFinite { id: String, field: &'static str },
    #[error("account `{id}`: balance must be >= 0, got {balance}")]
    NegativeBalance { id: String, balance: f64 },
    #[error("account `{id}`: annual rate must be >= 0, got {rate}")]
    NegativeRate { id: String, rate: f64 },
    #[error("account `{id}`: minimum payment must be >= 0, got {minimum}")]
    NegativeMinimumPayment { id: String, minimum: f64 },
    #[error("account `{id}`: annual fee must be >= 0, got {fee}")]
    NegativeAnnualFee { id: String, fee: f64 },
    #[error("monthly budget must be a finite number > 0, got {0}")]
    NonPositiveBudget(f64),
    #[error("max periods must be > 0")]
    ZeroMaxPeriods,
    #[error("invalid budget solver config: {0}")]
    InvalidSolveConfig(String),
}
