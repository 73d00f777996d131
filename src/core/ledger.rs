use super::types::{Account, PERIODS_PER_YEAR};

/// Result of running one account through one period at its minimum payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTransition {
    pub interest: f64,
    pub payment: f64,
    pub account: Account,
}

/// Accrue one period of interest and pay the minimum, capped at what is owed.
///
/// The balance only falls when the minimum covers the interest; otherwise it
/// grows, which is a legitimate state for a low-minimum account.
pub fn apply_period(account: &Account, periodic_rate: f64) -> PeriodTransition {
    let interest = account.balance * periodic_rate;
    let owed = account.balance + interest;
    let payment = account.minimum_payment.min(owed).max(0.0);

    let mut after = account.clone();
    after.balance = owed - payment;
    PeriodTransition {
        interest,
        payment,
        account: after,
    }
}

/// Post the flat annual fee on every twelfth period. Returns the fee charged.
pub fn post_annual_fee(account: &mut Account, period: u32) -> f64 {
    if account.annual_fee <= 0.0 || period == 0 || period % PERIODS_PER_YEAR != 0 {
        return 0.0;
    }
    account.balance += account.annual_fee;
    account.annual_fee
}

/// Put up to `amount` of extra payment on `account`. Returns what was applied.
pub fn apply_extra(account: &mut Account, amount: f64) -> f64 {
    if amount <= 0.0 || account.balance <= 0.0 {
        return 0.0;
    }
    let extra = amount.min(account.balance);
    account.balance -= extra;
    extra
}
