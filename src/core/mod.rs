mod engine;
mod error;
mod ledger;
mod solver;
mod strategy;
mod types;

pub use engine::{
    RunSummary, build_report, compare_strategies, is_feasible, minimum_payment_total,
    sample_trace, simulate, validate_accounts,
};
pub use error::InputError;
pub use ledger::{PeriodTransition, apply_extra, apply_period, post_annual_fee};
pub use solver::{BudgetSolveConfig, BudgetSolveIteration, BudgetSolveResult, solve_budget};
pub use types::{
    AbortReason, Account, AccountPayoff, BALANCE_EPSILON, DEFAULT_MAX_PERIODS, Outcome,
    PERIODS_PER_YEAR, PayoffReport, SamplingPolicy, SimulationOptions, Strategy,
    StrategyComparison, SurplusAllocation, TracePoint,
};
