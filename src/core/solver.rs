use serde::Serialize;
use tracing::debug;

use super::engine::{minimum_payment_total, simulate, validate_accounts};
use super::error::InputError;
use super::types::{Account, SimulationOptions, Strategy};

const MIN_SEARCH_BUDGET: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSolveConfig {
    pub target_months: u32,
    /// Upper search bound; defaults to clearing every balance in one period.
    pub search_max: Option<f64>,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub options: SimulationOptions,
}

impl BudgetSolveConfig {
    pub fn new(target_months: u32) -> Self {
        Self {
            target_months,
            search_max: None,
            tolerance: 1.0,
            max_iterations: 40,
            options: SimulationOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_budget: f64,
    pub months_to_payoff: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSolveResult {
    pub strategy: Strategy,
    pub target_months: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub solved_budget: Option<f64>,
    pub achieved_months: Option<u32>,
    pub achieved_interest: Option<f64>,
    pub iterations: Vec<BudgetSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Smallest monthly budget, to within `tolerance`, that clears every account
/// within `target_months`.
pub fn solve_budget(
    accounts: &[Account],
    strategy: Strategy,
    config: BudgetSolveConfig,
) -> Result<BudgetSolveResult, InputError> {
    validate_accounts(accounts)?;

    let open = accounts
        .iter()
        .filter(|a| a.is_open())
        .cloned()
        .collect::<Vec<_>>();
    let search_min = minimum_payment_total(&open).max(MIN_SEARCH_BUDGET);
    let search_max = config
        .search_max
        .unwrap_or_else(|| one_period_payoff_budget(&open).max(search_min));
    validate_config(config, search_min, search_max)?;

    let mut iterations = Vec::new();
    let low_months = evaluate_candidate(accounts, strategy, &config, search_min)?;
    let high_months = evaluate_candidate(accounts, strategy, &config, search_max)?;

    let mut solved_budget = None;
    let mut converged = false;
    let feasible;
    let message;

    if meets_target(low_months, config.target_months) {
        solved_budget = Some(search_min);
        converged = true;
        feasible = true;
        message = "Minimum payments alone already meet the target.".to_string();
    } else if !meets_target(high_months, config.target_months) {
        feasible = false;
        message = "No budget within the search bounds meets the target.".to_string();
    } else {
        let mut lo = search_min;
        let mut hi = search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let months = evaluate_candidate(accounts, strategy, &config, mid)?;
            iterations.push(BudgetSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_budget: mid,
                months_to_payoff: months,
            });

            if meets_target(months, config.target_months) {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_budget = Some(hi);
        feasible = true;
        message = if converged {
            "Solved required monthly budget.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let mut achieved_months = None;
    let mut achieved_interest = None;
    if let Some(budget) = solved_budget {
        let report = simulate(accounts, strategy, budget, &config.options)?;
        achieved_months = report.months_to_payoff;
        achieved_interest = Some(report.total_interest_paid);
    }
    debug!(
        ?strategy,
        target_months = config.target_months,
        ?solved_budget,
        iterations = iterations.len(),
        "budget solve finished"
    );

    Ok(BudgetSolveResult {
        strategy,
        target_months: config.target_months,
        search_min,
        search_max,
        tolerance: config.tolerance,
        solved_budget,
        achieved_months,
        achieved_interest,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn meets_target(months: Option<u32>, target_months: u32) -> bool {
    matches!(months, Some(m) if m <= target_months)
}

fn evaluate_candidate(
    accounts: &[Account],
    strategy: Strategy,
    config: &BudgetSolveConfig,
    budget: f64,
) -> Result<Option<u32>, InputError> {
    let report = simulate(accounts, strategy, budget, &config.options)?;
    Ok(report.months_to_payoff)
}

/// A budget that pays every minimum plus every balance, a period of interest
/// and a year's fee up front.
fn one_period_payoff_budget(accounts: &[Account]) -> f64 {
    accounts
        .iter()
        .map(|a| a.balance * (1.0 + a.periodic_rate()) + a.annual_fee + a.minimum_payment)
        .sum()
}

fn validate_config(
    config: BudgetSolveConfig,
    search_min: f64,
    search_max: f64,
) -> Result<(), InputError> {
    let invalid = |msg: &str| Err(InputError::InvalidSolveConfig(msg.to_string()));

    if config.target_months == 0 {
        return invalid("target_months must be > 0");
    }
    if config.options.max_periods == 0 {
        return Err(InputError::ZeroMaxPeriods);
    }
    if config.target_months > config.options.max_periods {
        return invalid("target_months must be <= max_periods");
    }
    if !search_max.is_finite() {
        return invalid("search_max must be finite");
    }
    if search_max < search_min {
        return invalid("search_max must be >= the minimum payment total");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be > 0");
    }
    Ok(())
}
