use serde::Serialize;

/// Balances at or below this are treated as paid off.
pub const BALANCE_EPSILON: f64 = 0.01;

pub const DEFAULT_MAX_PERIODS: u32 = 600;

pub const PERIODS_PER_YEAR: u32 = 12;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Highest annual rate first.
    Avalanche,
    /// Lowest balance first.
    Snowball,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SurplusAllocation {
    /// Surplus goes to the first account in strategy order only; anything
    /// left after that account closes is not spent this period.
    #[default]
    SingleTarget,
    /// Surplus left after the first account closes flows to the next one.
    Cascade,
}

/// One revolving balance as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub balance: f64,
    /// Annual percentage rate, e.g. `18.99`.
    pub annual_rate: f64,
    pub minimum_payment: f64,
    pub annual_fee: f64,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        balance: f64,
        annual_rate: f64,
        minimum_payment: f64,
    ) -> Self {
        Self {
            id: id.into(),
            balance,
            annual_rate,
            minimum_payment,
            annual_fee: 0.0,
        }
    }

    pub fn with_annual_fee(mut self, annual_fee: f64) -> Self {
        self.annual_fee = annual_fee;
        self
    }

    pub fn periodic_rate(&self) -> f64 {
        self.annual_rate / 100.0 / PERIODS_PER_YEAR as f64
    }

    pub fn is_open(&self) -> bool {
        self.balance > BALANCE_EPSILON
    }
}

/// Trace sampling cadence: every `early_cadence` periods up to
/// `early_window`, every `late_cadence` periods after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    pub early_cadence: u32,
    pub early_window: u32,
    pub late_cadence: u32,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            early_cadence: 3,
            early_window: 24,
            late_cadence: 6,
        }
    }
}

impl SamplingPolicy {
    /// Whether `period` is kept in the sampled trace. Period 0 (the starting
    /// position) is always kept.
    pub fn includes(&self, period: u32) -> bool {
        if period == 0 {
            return true;
        }
        if period <= self.early_window {
            period % self.early_cadence.max(1) == 0
        } else {
            period % self.late_cadence.max(1) == 0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOptions {
    pub max_periods: u32,
    pub surplus: SurplusAllocation,
    pub sampling: SamplingPolicy,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            max_periods: DEFAULT_MAX_PERIODS,
            surplus: SurplusAllocation::default(),
            sampling: SamplingPolicy::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    MaxPeriodsExceeded,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum Outcome {
    Completed,
    Infeasible,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracePoint {
    pub period: u32,
    pub total_remaining_balance: f64,
    pub cumulative_interest: f64,
    pub accounts_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayoff {
    pub id: String,
    pub period: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffReport {
    pub strategy: Strategy,
    pub outcome: Outcome,
    pub monthly_budget: f64,
    /// Only set when `outcome` is `Completed`.
    pub months_to_payoff: Option<u32>,
    pub periods_simulated: u32,
    pub total_interest_paid: f64,
    pub total_fees_paid: f64,
    pub total_paid: f64,
    pub minimum_payment_total: f64,
    pub payoff_order: Vec<AccountPayoff>,
    pub trace: Vec<TracePoint>,
}

impl PayoffReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub avalanche: PayoffReport,
    pub snowball: PayoffReport,
    /// Snowball interest minus avalanche interest.
    pub interest_saved: f64,
    /// Snowball months minus avalanche months, when both complete.
    pub months_saved: Option<i64>,
}
