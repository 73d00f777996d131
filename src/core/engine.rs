use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use super::error::InputError;
use super::ledger::{apply_extra, apply_period, post_annual_fee};
use super::types::{
    AbortReason, Account, AccountPayoff, Outcome, PayoffReport, SamplingPolicy,
    SimulationOptions, Strategy, StrategyComparison, SurplusAllocation, TracePoint,
};

/// Relative slack when comparing a budget against summed minimums.
const FEASIBILITY_SLACK: f64 = 1e-9;

/// Scalars gathered over a run, handed to [`build_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub strategy: Strategy,
    pub monthly_budget: f64,
    pub minimum_payment_total: f64,
    pub periods_simulated: u32,
    pub cumulative_interest: f64,
    pub cumulative_fees: f64,
    pub total_paid: f64,
    pub payoff_order: Vec<AccountPayoff>,
}

#[derive(Debug)]
struct RunState {
    open: Vec<Account>,
    period: u32,
    cumulative_interest: f64,
    cumulative_fees: f64,
    total_paid: f64,
    payoff_order: Vec<AccountPayoff>,
    trace: Vec<TracePoint>,
}

impl RunState {
    fn new(accounts: &[Account]) -> Self {
        let open = accounts
            .iter()
            .filter(|a| a.is_open())
            .cloned()
            .collect::<Vec<_>>();
        let payoff_order = accounts
            .iter()
            .filter(|a| !a.is_open())
            .map(|a| AccountPayoff {
                id: a.id.clone(),
                period: 0,
            })
            .collect();

        let mut state = Self {
            open,
            period: 0,
            cumulative_interest: 0.0,
            cumulative_fees: 0.0,
            total_paid: 0.0,
            payoff_order,
            trace: Vec::new(),
        };
        state.trace.push(state.snapshot());
        state
    }

    fn snapshot(&self) -> TracePoint {
        TracePoint {
            period: self.period,
            total_remaining_balance: self.open.iter().map(|a| a.balance).sum(),
            cumulative_interest: self.cumulative_interest,
            accounts_remaining: self.open.len(),
        }
    }

    fn step(&mut self, strategy: Strategy, monthly_budget: f64, surplus: SurplusAllocation) {
        self.period += 1;

        let mut minimums_applied = 0.0;
        for account in &mut self.open {
            self.cumulative_fees += post_annual_fee(account, self.period);
            let step = apply_period(account, account.periodic_rate());
            self.cumulative_interest += step.interest;
            minimums_applied += step.payment;
            *account = step.account;
        }

        // Snowball order moves as balances shrink, so always re-sort.
        strategy.sort(&mut self.open);

        let mut budget_remaining = monthly_budget - minimums_applied;
        let mut extra_applied = 0.0;
        for account in self.open.iter_mut().filter(|a| a.is_open()) {
            if budget_remaining <= 0.0 {
                break;
            }
            let extra = apply_extra(account, budget_remaining);
            budget_remaining -= extra;
            extra_applied += extra;
            if surplus == SurplusAllocation::SingleTarget {
                break;
            }
        }
        self.total_paid += minimums_applied + extra_applied;

        let period = self.period;
        let (open, closed): (Vec<_>, Vec<_>) = self.open.drain(..).partition(|a| a.is_open());
        self.open = open;
        self.payoff_order
            .extend(closed.into_iter().map(|a| AccountPayoff { id: a.id, period }));

        let point = self.snapshot();
        trace!(
            period,
            remaining = point.total_remaining_balance,
            interest = point.cumulative_interest,
            open = point.accounts_remaining,
            "period simulated"
        );
        self.trace.push(point);
    }

    fn into_summary(
        self,
        strategy: Strategy,
        monthly_budget: f64,
        minimum_payment_total: f64,
    ) -> (RunSummary, Vec<TracePoint>) {
        let summary = RunSummary {
            strategy,
            monthly_budget,
            minimum_payment_total,
            periods_simulated: self.period,
            cumulative_interest: self.cumulative_interest,
            cumulative_fees: self.cumulative_fees,
            total_paid: self.total_paid,
            payoff_order: self.payoff_order,
        };
        (summary, self.trace)
    }
}

pub fn validate_accounts(accounts: &[Account]) -> Result<(), InputError> {
    if accounts.is_empty() {
        return Err(InputError::NoAccounts);
    }

    let mut seen = HashSet::with_capacity(accounts.len());
    for account in accounts {
        if !seen.insert(account.id.as_str()) {
            return Err(InputError::DuplicateAccountId(account.id.clone()));
        }

        for (field, value) in [
            ("balance", account.balance),
            ("annual rate", account.annual_rate),
            ("minimum payment", account.minimum_payment),
            ("annual fee", account.annual_fee),
        ] {
            if !value.is_finite() {
                return Err(InputError::NonFinite {
                    id: account.id.clone(),
                    field,
                });
            }
        }

        if account.balance < 0.0 {
            return Err(InputError::NegativeBalance {
                id: account.id.clone(),
                balance: account.balance,
            });
        }
        if account.annual_rate < 0.0 {
            return Err(InputError::NegativeRate {
                id: account.id.clone(),
                rate: account.annual_rate,
            });
        }
        if account.minimum_payment < 0.0 {
            return Err(InputError::NegativeMinimumPayment {
                id: account.id.clone(),
                minimum: account.minimum_payment,
            });
        }
        if account.annual_fee < 0.0 {
            return Err(InputError::NegativeAnnualFee {
                id: account.id.clone(),
                fee: account.annual_fee,
            });
        }
    }

    Ok(())
}

fn validate_run(
    accounts: &[Account],
    monthly_budget: f64,
    options: &SimulationOptions,
) -> Result<(), InputError> {
    validate_accounts(accounts)?;
    if !monthly_budget.is_finite() || monthly_budget <= 0.0 {
        return Err(InputError::NonPositiveBudget(monthly_budget));
    }
    if options.max_periods == 0 {
        return Err(InputError::ZeroMaxPeriods);
    }
    Ok(())
}

pub fn minimum_payment_total(accounts: &[Account]) -> f64 {
    accounts.iter().map(|a| a.minimum_payment).sum()
}

/// True when the budget covers every account's minimum payment.
///
/// Summing cent amounts drifts in the last bits, so a budget equal to the
/// minimums as entered still counts as covering them.
pub fn is_feasible(accounts: &[Account], monthly_budget: f64) -> bool {
    let total = minimum_payment_total(accounts);
    monthly_budget + FEASIBILITY_SLACK * total.max(1.0) >= total
}

/// Run the payoff plan month by month until every account is closed, the
/// budget proves too small for the minimums, or `max_periods` runs out.
///
/// `accounts` is never modified; the run works on its own copy.
pub fn simulate(
    accounts: &[Account],
    strategy: Strategy,
    monthly_budget: f64,
    options: &SimulationOptions,
) -> Result<PayoffReport, InputError> {
    validate_run(accounts, monthly_budget, options)?;

    let mut state = RunState::new(accounts);
    let minimum_total = minimum_payment_total(&state.open);
    debug!(
        ?strategy,
        monthly_budget,
        minimum_total,
        open = state.open.len(),
        max_periods = options.max_periods,
        "starting payoff simulation"
    );

    if !is_feasible(&state.open, monthly_budget) {
        warn!(
            monthly_budget,
            minimum_total, "budget does not cover minimum payments"
        );
        let (summary, trace) = state.into_summary(strategy, monthly_budget, minimum_total);
        return Ok(build_report(
            &trace,
            summary,
            Outcome::Infeasible,
            &options.sampling,
        ));
    }

    let outcome = loop {
        if state.open.is_empty() {
            break Outcome::Completed;
        }
        if state.period >= options.max_periods {
            break Outcome::Aborted(AbortReason::MaxPeriodsExceeded);
        }
        state.step(strategy, monthly_budget, options.surplus);
    };

    match outcome {
        Outcome::Completed => info!(
            months = state.period,
            interest = state.cumulative_interest,
            "debt-free"
        ),
        _ => warn!(
            max_periods = options.max_periods,
            remaining = state.open.len(),
            "payoff did not converge within the period limit"
        ),
    }

    let (summary, trace) = state.into_summary(strategy, monthly_budget, minimum_total);
    Ok(build_report(&trace, summary, outcome, &options.sampling))
}

/// Keep the periods selected by `policy`, plus the final period even when the
/// cadence would skip it.
pub fn sample_trace(trace: &[TracePoint], policy: &SamplingPolicy) -> Vec<TracePoint> {
    let mut sampled = trace
        .iter()
        .filter(|p| policy.includes(p.period))
        .copied()
        .collect::<Vec<_>>();

    if let Some(last) = trace.last() {
        if sampled.last().map(|p| p.period) != Some(last.period) {
            sampled.push(*last);
        }
    }
    sampled
}

pub fn build_report(
    trace: &[TracePoint],
    summary: RunSummary,
    outcome: Outcome,
    sampling: &SamplingPolicy,
) -> PayoffReport {
    let months_to_payoff = match outcome {
        Outcome::Completed => Some(summary.periods_simulated),
        Outcome::Infeasible | Outcome::Aborted(_) => None,
    };

    PayoffReport {
        strategy: summary.strategy,
        outcome,
        monthly_budget: summary.monthly_budget,
        months_to_payoff,
        periods_simulated: summary.periods_simulated,
        total_interest_paid: summary.cumulative_interest,
        total_fees_paid: summary.cumulative_fees,
        total_paid: summary.total_paid,
        minimum_payment_total: summary.minimum_payment_total,
        payoff_order: summary.payoff_order,
        trace: sample_trace(trace, sampling),
    }
}

/// Run both strategies on the same inputs.
pub fn compare_strategies(
    accounts: &[Account],
    monthly_budget: f64,
    options: &SimulationOptions,
) -> Result<StrategyComparison, InputError> {
    let avalanche = simulate(accounts, Strategy::Avalanche, monthly_budget, options)?;
    let snowball = simulate(accounts, Strategy::Snowball, monthly_budget, options)?;

    let interest_saved = snowball.total_interest_paid - avalanche.total_interest_paid;
    let months_saved = match (avalanche.months_to_payoff, snowball.months_to_payoff) {
        (Some(a), Some(s)) => Some(s as i64 - a as i64),
        _ => None,
    };

    Ok(StrategyComparison {
        avalanche,
        snowball,
        interest_saved,
        months_saved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BALANCE_EPSILON;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, prop_assume, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn two_cards() -> Vec<Account> {
        vec![
            Account::new("card-a", 5_000.0, 18.99, 100.0),
            Account::new("card-b", 3_000.0, 22.99, 60.0),
        ]
    }

    fn accounts_from(raw: &[(u32, u32, u32)]) -> Vec<Account> {
        raw.iter()
            .enumerate()
            .map(|(idx, &(balance, rate_bp, minimum))| {
                Account::new(
                    format!("acct-{idx}"),
                    balance as f64,
                    rate_bp as f64 / 100.0,
                    minimum as f64,
                )
            })
            .collect()
    }

    /// Minimums that always beat the first period's interest by at least 1.
    fn accounts_with_covering_minimums(raw: &[(u32, u32, u32)]) -> Vec<Account> {
        let mut accounts = accounts_from(raw);
        for account in &mut accounts {
            account.minimum_payment =
                (account.balance * account.periodic_rate()).ceil() + account.minimum_payment + 1.0;
        }
        accounts
    }

    /// Keeps every period in the trace.
    fn every_period() -> SimulationOptions {
        SimulationOptions {
            sampling: SamplingPolicy {
                early_cadence: 1,
                early_window: 0,
                late_cadence: 1,
            },
            ..SimulationOptions::default()
        }
    }

    fn conservation_gap(accounts: &[Account], report: &PayoffReport) -> f64 {
        let initial: f64 = accounts.iter().map(|a| a.balance).sum();
        report.total_paid - (initial + report.total_interest_paid + report.total_fees_paid)
    }

    #[test]
    fn scenario_avalanche_targets_highest_rate_and_beats_snowball() {
        let accounts = two_cards();
        let options = SimulationOptions::default();

        let avalanche = simulate(&accounts, Strategy::Avalanche, 300.0, &options).expect("valid");
        assert_eq!(avalanche.outcome, Outcome::Completed);
        assert_eq!(avalanche.payoff_order[0].id, "card-b");
        assert!(avalanche.payoff_order[0].period < avalanche.payoff_order[1].period);

        let snowball = simulate(&accounts, Strategy::Snowball, 300.0, &options).expect("valid");
        assert_eq!(snowball.outcome, Outcome::Completed);
        // The smaller card is also the dearer one here, so both plans agree.
        assert!(avalanche.total_interest_paid <= snowball.total_interest_paid + EPS);
    }

    #[test]
    fn avalanche_pays_strictly_less_interest_when_orders_diverge() {
        let accounts = vec![
            Account::new("small-cheap", 1_000.0, 5.0, 25.0),
            Account::new("big-dear", 6_000.0, 25.0, 150.0),
        ];
        let options = SimulationOptions::default();

        let avalanche = simulate(&accounts, Strategy::Avalanche, 400.0, &options).expect("valid");
        let snowball = simulate(&accounts, Strategy::Snowball, 400.0, &options).expect("valid");

        assert!(avalanche.is_completed());
        assert!(snowball.is_completed());
        assert_eq!(avalanche.payoff_order[0].id, "big-dear");
        assert_eq!(snowball.payoff_order[0].id, "small-cheap");
        assert!(avalanche.total_interest_paid < snowball.total_interest_paid);
    }

    #[test]
    fn single_target_surplus_can_cost_avalanche_more_interest() {
        // Avalanche's first target is far smaller than the surplus, and the
        // leftover is dropped each period until it closes.
        let accounts = vec![
            Account::new("a", 2_000.0, 26.0, 125.0),
            Account::new("b", 2_500.0, 29.0, 250.0),
            Account::new("c", 8_500.0, 23.0, 225.0),
        ];
        let single = SimulationOptions::default();
        let cascade = SimulationOptions {
            surplus: SurplusAllocation::Cascade,
            ..SimulationOptions::default()
        };

        let avalanche = simulate(&accounts, Strategy::Avalanche, 2_600.0, &single).expect("valid");
        let snowball = simulate(&accounts, Strategy::Snowball, 2_600.0, &single).expect("valid");
        assert!(avalanche.is_completed());
        assert!(snowball.is_completed());
        assert!(avalanche.total_interest_paid > snowball.total_interest_paid + 100.0);

        let avalanche = simulate(&accounts, Strategy::Avalanche, 2_600.0, &cascade).expect("valid");
        let snowball = simulate(&accounts, Strategy::Snowball, 2_600.0, &cascade).expect("valid");
        assert!(avalanche.total_interest_paid <= snowball.total_interest_paid);
    }

    #[test]
    fn scenario_budget_below_minimum_is_infeasible() {
        let accounts = vec![Account::new("card", 5_000.0, 18.99, 150.0)];
        let report =
            simulate(&accounts, Strategy::Avalanche, 100.0, &SimulationOptions::default())
                .expect("valid input");

        assert_eq!(report.outcome, Outcome::Infeasible);
        assert_eq!(report.months_to_payoff, None);
        assert_eq!(report.periods_simulated, 0);
        assert_eq!(report.total_paid, 0.0);
        assert_eq!(report.total_interest_paid, 0.0);
        assert_eq!(report.minimum_payment_total, 150.0);
        assert_eq!(report.trace.len(), 1);
        assert_eq!(report.trace[0].total_remaining_balance, 5_000.0);
    }

    #[test]
    fn scenario_tiny_surplus_aborts_at_max_periods() {
        let accounts = vec![Account::new("mortgage-sized", 1_000_000.0, 0.01, 1.0)];
        let options = SimulationOptions {
            max_periods: 12,
            ..SimulationOptions::default()
        };
        let report = simulate(&accounts, Strategy::Snowball, 1.01, &options).expect("valid");

        assert_eq!(
            report.outcome,
            Outcome::Aborted(AbortReason::MaxPeriodsExceeded)
        );
        assert_eq!(report.months_to_payoff, None);
        assert_eq!(report.periods_simulated, 12);
        let last = report.trace.last().expect("trace is never empty");
        assert_eq!(last.period, 12);
        assert!(last.total_remaining_balance > 1_000_000.0);
    }

    #[test]
    fn scenario_minimum_only_matches_closed_form_amortization() {
        let balance = 1_000.0;
        let annual_rate = 12.0;
        let payment = 100.0;
        let accounts = vec![Account::new("loan", balance, annual_rate, payment)];

        let report =
            simulate(&accounts, Strategy::Avalanche, payment, &SimulationOptions::default())
                .expect("valid");

        let r = annual_rate / 100.0 / 12.0;
        let expected_months = (-(1.0 - r * balance / payment).ln() / (1.0 + r).ln()).ceil() as u32;
        assert_eq!(report.months_to_payoff, Some(expected_months));
        assert_eq!(expected_months, 11);

        for pair in report.trace.windows(2) {
            assert!(pair[1].total_remaining_balance < pair[0].total_remaining_balance);
        }
        assert_eq!(report.trace.last().map(|p| p.total_remaining_balance), Some(0.0));
        assert_approx_tol(conservation_gap(&accounts, &report), 0.0, EPS);

        let again =
            simulate(&accounts, Strategy::Avalanche, payment, &SimulationOptions::default())
                .expect("valid");
        assert_eq!(report, again);
    }

    #[test]
    fn cascade_spends_leftover_surplus_on_next_account() {
        let accounts = vec![
            Account::new("a", 100.0, 10.0, 10.0),
            Account::new("b", 1_000.0, 5.0, 20.0),
        ];
        let single = simulate(
            &accounts,
            Strategy::Avalanche,
            500.0,
            &SimulationOptions::default(),
        )
        .expect("valid");
        let cascade = simulate(
            &accounts,
            Strategy::Avalanche,
            500.0,
            &SimulationOptions {
                surplus: SurplusAllocation::Cascade,
                ..SimulationOptions::default()
            },
        )
        .expect("valid");

        assert!(single.is_completed());
        assert!(cascade.is_completed());
        assert!(cascade.total_interest_paid < single.total_interest_paid);
        assert!(cascade.months_to_payoff <= single.months_to_payoff);
        assert_approx_tol(conservation_gap(&accounts, &cascade), 0.0, EPS);
    }

    #[test]
    fn surplus_skips_account_already_closed_by_its_minimum() {
        // "tiny" is cleared by its own minimum and sorts first under snowball;
        // the surplus must still land on "big".
        let accounts = vec![
            Account::new("tiny", 10.0, 0.0, 25.0),
            Account::new("big", 1_000.0, 0.0, 25.0),
        ];
        let options = SimulationOptions {
            sampling: SamplingPolicy {
                early_cadence: 1,
                early_window: 24,
                late_cadence: 1,
            },
            ..SimulationOptions::default()
        };
        let report = simulate(&accounts, Strategy::Snowball, 125.0, &options).expect("valid");

        // Period 1: tiny pays 10, big pays 25 + 90 surplus.
        assert_approx_tol(report.trace[1].total_remaining_balance, 885.0, EPS);
        assert_eq!(report.trace[1].accounts_remaining, 1);
        assert_eq!(
            report.payoff_order[0],
            AccountPayoff {
                id: "tiny".to_string(),
                period: 1
            }
        );
    }

    #[test]
    fn annual_fee_is_charged_and_conserved() {
        let accounts = vec![Account::new("amex", 3_000.0, 15.0, 100.0).with_annual_fee(95.0)];
        let report =
            simulate(&accounts, Strategy::Avalanche, 150.0, &SimulationOptions::default())
                .expect("valid");

        assert!(report.is_completed());
        let months = report.months_to_payoff.expect("completed");
        assert!(months > 12);
        let expected_fees = 95.0 * (months / 12) as f64;
        assert_approx_tol(report.total_fees_paid, expected_fees, EPS);
        assert_approx_tol(conservation_gap(&accounts, &report), 0.0, BALANCE_EPSILON);
    }

    #[test]
    fn zero_balance_accounts_close_at_period_zero() {
        let accounts = vec![
            Account::new("paid", 0.0, 20.0, 35.0),
            Account::new("live", 500.0, 12.0, 50.0),
        ];
        let report = simulate(&accounts, Strategy::Snowball, 50.0, &SimulationOptions::default())
            .expect("valid");

        assert_eq!(report.minimum_payment_total, 50.0);
        assert_eq!(report.payoff_order[0].id, "paid");
        assert_eq!(report.payoff_order[0].period, 0);
        assert!(report.is_completed());

        let all_paid = vec![Account::new("paid", 0.0, 20.0, 35.0)];
        let report = simulate(&all_paid, Strategy::Snowball, 1.0, &SimulationOptions::default())
            .expect("valid");
        assert_eq!(report.months_to_payoff, Some(0));
        assert_eq!(report.trace.len(), 1);
    }

    #[test]
    fn budget_equal_to_cent_minimums_is_feasible() {
        // 0.1 + 0.2 sums to 0.30000000000000004.
        let accounts = vec![
            Account::new("a", 10.0, 0.0, 0.1),
            Account::new("b", 20.0, 0.0, 0.2),
        ];
        assert!(is_feasible(&accounts, 0.3));
        assert!(!is_feasible(&accounts, 0.29));

        let report = simulate(&accounts, Strategy::Avalanche, 0.3, &SimulationOptions::default())
            .expect("valid");
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.months_to_payoff, Some(100));
    }

    #[test]
    fn invalid_inputs_are_rejected_before_simulation() {
        let options = SimulationOptions::default();
        assert_eq!(
            simulate(&[], Strategy::Avalanche, 100.0, &options),
            Err(InputError::NoAccounts)
        );

        let negative = vec![Account::new("x", -1.0, 10.0, 10.0)];
        assert!(matches!(
            simulate(&negative, Strategy::Avalanche, 100.0, &options),
            Err(InputError::NegativeBalance { .. })
        ));

        let negative_rate = vec![Account::new("x", 10.0, -3.0, 10.0)];
        assert!(matches!(
            simulate(&negative_rate, Strategy::Avalanche, 100.0, &options),
            Err(InputError::NegativeRate { .. })
        ));

        let nan = vec![Account::new("x", 10.0, f64::NAN, 10.0)];
        assert!(matches!(
            simulate(&nan, Strategy::Avalanche, 100.0, &options),
            Err(InputError::NonFinite {
                field: "annual rate",
                ..
            })
        ));

        let dupes = vec![
            Account::new("x", 10.0, 1.0, 1.0),
            Account::new("x", 20.0, 2.0, 1.0),
        ];
        assert_eq!(
            simulate(&dupes, Strategy::Avalanche, 100.0, &options),
            Err(InputError::DuplicateAccountId("x".to_string()))
        );

        let ok = two_cards();
        assert_eq!(
            simulate(&ok, Strategy::Avalanche, 0.0, &options),
            Err(InputError::NonPositiveBudget(0.0))
        );
        assert_eq!(
            simulate(
                &ok,
                Strategy::Avalanche,
                300.0,
                &SimulationOptions {
                    max_periods: 0,
                    ..options
                }
            ),
            Err(InputError::ZeroMaxPeriods)
        );
    }

    #[test]
    fn sampling_keeps_cadence_and_final_period() {
        let trace = (0..=40)
            .map(|period| TracePoint {
                period,
                total_remaining_balance: (40 - period) as f64,
                cumulative_interest: period as f64,
                accounts_remaining: 1,
            })
            .collect::<Vec<_>>();

        let sampled = sample_trace(&trace, &SamplingPolicy::default());
        let periods = sampled.iter().map(|p| p.period).collect::<Vec<_>>();
        assert_eq!(
            periods,
            vec![0, 3, 6, 9, 12, 15, 18, 21, 24, 30, 36, 40]
        );
    }

    #[test]
    fn sampling_does_not_duplicate_a_final_period_on_cadence() {
        let trace = (0..=30)
            .map(|period| TracePoint {
                period,
                total_remaining_balance: 0.0,
                cumulative_interest: 0.0,
                accounts_remaining: 0,
            })
            .collect::<Vec<_>>();
        let sampled = sample_trace(&trace, &SamplingPolicy::default());
        assert_eq!(sampled.last().map(|p| p.period), Some(30));
        assert_eq!(sampled.iter().filter(|p| p.period == 30).count(), 1);
    }

    #[test]
    fn compare_reports_savings_for_both_plans() {
        let accounts = vec![
            Account::new("small-cheap", 1_000.0, 5.0, 25.0),
            Account::new("big-dear", 6_000.0, 25.0, 150.0),
        ];
        let comparison =
            compare_strategies(&accounts, 400.0, &SimulationOptions::default()).expect("valid");

        assert_eq!(comparison.avalanche.strategy, Strategy::Avalanche);
        assert_eq!(comparison.snowball.strategy, Strategy::Snowball);
        assert!(comparison.interest_saved > 0.0);
        assert!(comparison.months_saved.is_some());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_simulation_always_terminates_within_max_periods(
            raw in vec((0u32..50_000, 0u32..4_000, 0u32..600), 1..6),
            budget_extra in 0u32..3_000,
            max_periods in 1u32..240,
            cascade in proptest::bool::ANY,
            snowball in proptest::bool::ANY,
        ) {
            let accounts = accounts_from(&raw);
            let budget = minimum_payment_total(&accounts) + budget_extra as f64 + 1.0;
            let options = SimulationOptions {
                max_periods,
                surplus: if cascade { SurplusAllocation::Cascade } else { SurplusAllocation::SingleTarget },
                ..SimulationOptions::default()
            };
            let strategy = if snowball { Strategy::Snowball } else { Strategy::Avalanche };

            let report = simulate(&accounts, strategy, budget, &options).expect("valid");
            prop_assert!(report.periods_simulated <= max_periods);
            prop_assert_eq!(report.trace.last().map(|p| p.period), Some(report.periods_simulated));
            match report.outcome {
                Outcome::Completed => {
                    prop_assert_eq!(report.months_to_payoff, Some(report.periods_simulated));
                    prop_assert_eq!(report.payoff_order.len(), accounts.len());
                }
                Outcome::Aborted(_) => prop_assert_eq!(report.periods_simulated, max_periods),
                Outcome::Infeasible => prop_assert!(false, "budget covers minimums"),
            }
        }

        #[test]
        fn prop_cumulative_interest_never_decreases(
            raw in vec((1u32..40_000, 0u32..3_500, 1u32..800), 1..6),
            budget_extra in 0u32..2_000,
        ) {
            let accounts = accounts_from(&raw);
            let budget = minimum_payment_total(&accounts) + budget_extra as f64;
            let report = simulate(&accounts, Strategy::Snowball, budget, &every_period())
                .expect("valid");

            for pair in report.trace.windows(2) {
                prop_assert_eq!(pair[1].period, pair[0].period + 1);
                prop_assert!(pair[1].cumulative_interest >= pair[0].cumulative_interest);
            }
        }

        #[test]
        fn prop_balance_strictly_falls_when_minimums_beat_interest(
            raw in vec((1u32..40_000, 0u32..3_500, 0u32..300), 1..6),
            budget_extra in 0u32..2_000,
            snowball in proptest::bool::ANY,
        ) {
            let accounts = accounts_with_covering_minimums(&raw);
            let budget = minimum_payment_total(&accounts) + budget_extra as f64;
            let strategy = if snowball { Strategy::Snowball } else { Strategy::Avalanche };
            let report = simulate(&accounts, strategy, budget, &every_period()).expect("valid");

            for pair in report.trace.windows(2) {
                prop_assert_eq!(pair[1].period, pair[0].period + 1);
                prop_assert!(pair[1].total_remaining_balance < pair[0].total_remaining_balance);
            }
        }

        #[test]
        fn prop_completed_runs_conserve_money(
            raw in vec((1u32..40_000, 0u32..3_500, 0u32..300), 1..6),
            fee in 0u32..200,
            budget_extra in 0u32..2_000,
            cascade in proptest::bool::ANY,
        ) {
            let mut accounts = accounts_with_covering_minimums(&raw);
            accounts[0].annual_fee = fee as f64;
            let budget = minimum_payment_total(&accounts) + budget_extra as f64;
            let options = SimulationOptions {
                surplus: if cascade { SurplusAllocation::Cascade } else { SurplusAllocation::SingleTarget },
                ..SimulationOptions::default()
            };
            let report = simulate(&accounts, Strategy::Avalanche, budget, &options).expect("valid");
            prop_assume!(report.is_completed());

            let tolerance = BALANCE_EPSILON * accounts.len() as f64 + 1e-7 * report.total_paid;
            prop_assert!(conservation_gap(&accounts, &report).abs() <= tolerance);
        }

        #[test]
        fn prop_avalanche_interest_never_exceeds_snowball_when_cascading(
            raw in vec((1u32..30_000, 0u32..3_000, 0u32..200), 2..6),
            budget_extra in 1u32..2_000,
        ) {
            let accounts = accounts_with_covering_minimums(&raw);
            let first_rate = accounts[0].annual_rate;
            prop_assume!(accounts.iter().any(|a| a.annual_rate != first_rate));

            let budget = minimum_payment_total(&accounts) + budget_extra as f64;
            let options = SimulationOptions {
                surplus: SurplusAllocation::Cascade,
                ..SimulationOptions::default()
            };
            let comparison = compare_strategies(&accounts, budget, &options).expect("valid");
            prop_assume!(comparison.avalanche.is_completed() && comparison.snowball.is_completed());

            let tolerance = BALANCE_EPSILON * accounts.len() as f64;
            prop_assert!(
                comparison.avalanche.total_interest_paid
                    <= comparison.snowball.total_interest_paid + tolerance
            );
        }

        #[test]
        fn prop_feasibility_is_idempotent_across_runs(
            raw in vec((0u32..20_000, 0u32..3_000, 0u32..500), 1..6),
            budget in 1u32..3_000,
        ) {
            let accounts = accounts_from(&raw);
            let budget = budget as f64;
            let before = is_feasible(&accounts, budget);
            let snapshot = accounts.clone();

            let _ = simulate(&accounts, Strategy::Avalanche, budget, &SimulationOptions::default());
            prop_assert_eq!(is_feasible(&accounts, budget), before);
            prop_assert_eq!(is_feasible(&accounts, budget), before);
            prop_assert_eq!(&accounts, &snapshot);
        }
    }
}
