use axum::{
    Router,
    extract::Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use clap::{Parser, ValueEnum, error::ErrorKind};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    Account, BudgetSolveConfig, BudgetSolveResult, DEFAULT_MAX_PERIODS, InputError, PayoffReport,
    SimulationOptions, Strategy, StrategyComparison, SurplusAllocation, compare_strategies,
    simulate, solve_budget, validate_accounts,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliStrategy {
    Avalanche,
    Snowball,
}

impl From<CliStrategy> for Strategy {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::Avalanche => Strategy::Avalanche,
            CliStrategy::Snowball => Strategy::Snowball,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiStrategy {
    #[serde(alias = "highest-rate", alias = "highestRate", alias = "highest_rate")]
    Avalanche,
    #[serde(alias = "lowest-balance", alias = "lowestBalance", alias = "lowest_balance")]
    Snowball,
}

impl From<ApiStrategy> for CliStrategy {
    fn from(value: ApiStrategy) -> Self {
        match value {
            ApiStrategy::Avalanche => CliStrategy::Avalanche,
            ApiStrategy::Snowball => CliStrategy::Snowball,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AnalysisMode {
    SinglePlan,
    Compare,
    SolveBudget,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountPayload {
    id: String,
    balance: f64,
    annual_rate: f64,
    minimum_payment: f64,
    #[serde(default)]
    annual_fee: Option<f64>,
}

impl From<AccountPayload> for Account {
    fn from(value: AccountPayload) -> Self {
        Account::new(
            value.id,
            value.balance,
            value.annual_rate,
            value.minimum_payment,
        )
        .with_annual_fee(value.annual_fee.unwrap_or(0.0))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PayoffPayload {
    accounts: Option<Vec<AccountPayload>>,
    monthly_budget: Option<f64>,
    strategy: Option<ApiStrategy>,
    max_periods: Option<u32>,
    cascade_surplus: Option<bool>,
    target_months: Option<u32>,
    solver_tolerance: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "payoff",
    about = "Multi-account debt payoff planner (avalanche / snowball)"
)]
struct Cli {
    #[arg(
        long = "account",
        value_name = "ID:BALANCE:APR:MINIMUM[:ANNUAL_FEE]",
        value_parser = parse_account_arg,
        required = true,
        help = "Revolving account, repeatable. APR in percent, e.g. visa:5000:18.99:100"
    )]
    accounts: Vec<Account>,
    #[arg(
        long,
        help = "Total amount available for debt each month; not needed with --target-months"
    )]
    budget: Option<f64>,
    #[arg(long, value_enum, default_value_t = CliStrategy::Avalanche)]
    strategy: CliStrategy,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_PERIODS,
        help = "Give up after this many months"
    )]
    max_periods: u32,
    #[arg(
        long,
        default_value_t = false,
        help = "Spend surplus left after the first target on the next account in the same month"
    )]
    cascade_surplus: bool,
    #[arg(long, default_value_t = false, help = "Run avalanche and snowball side by side")]
    compare: bool,
    #[arg(
        long,
        help = "Solve for the budget that clears all debt within this many months"
    )]
    target_months: Option<u32>,
    #[arg(long, default_value_t = 1.0, help = "Budget solver tolerance")]
    solver_tolerance: f64,
    #[arg(long, default_value = "warn", help = "Log level when RUST_LOG is unset")]
    log_level: String,
}

#[derive(Debug, Clone)]
struct PlanRequest {
    accounts: Vec<Account>,
    strategy: Strategy,
    monthly_budget: f64,
    options: SimulationOptions,
    mode: AnalysisMode,
    target_months: Option<u32>,
    solver_tolerance: f64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PlanResponse {
    Payoff(PayoffReport),
    Comparison(StrategyComparison),
    Budget(BudgetSolveResult),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_account_arg(raw: &str) -> Result<Account, String> {
    let parts = raw.split(':').collect::<Vec<_>>();
    if !(4..=5).contains(&parts.len()) {
        return Err(format!(
            "expected ID:BALANCE:APR:MINIMUM[:ANNUAL_FEE], got `{raw}`"
        ));
    }

    let id = parts[0].trim();
    if id.is_empty() {
        return Err("account id must not be empty".to_string());
    }
    let number = |name: &str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("account `{id}`: {name} `{value}` is not a number"))
    };

    let account = Account::new(
        id,
        number("balance", parts[1])?,
        number("APR", parts[2])?,
        number("minimum", parts[3])?,
    );
    match parts.get(4).copied() {
        Some(fee) => Ok(account.with_annual_fee(number("annual fee", fee)?)),
        None => Ok(account),
    }
}

fn build_plan(cli: Cli, mode: AnalysisMode) -> Result<PlanRequest, String> {
    if cli.accounts.is_empty() {
        return Err("--account is required at least once".to_string());
    }

    let monthly_budget = match cli.budget {
        // The solver searches for its own budget.
        _ if mode == AnalysisMode::SolveBudget => cli.budget.unwrap_or(0.0),
        Some(budget) if budget.is_finite() && budget > 0.0 => budget,
        Some(_) => return Err("--budget must be > 0".to_string()),
        None => return Err("--budget is required unless --target-months is set".to_string()),
    };

    if cli.max_periods == 0 {
        return Err("--max-periods must be > 0".to_string());
    }

    if mode == AnalysisMode::SolveBudget {
        let Some(target) = cli.target_months else {
            return Err("--target-months is required to solve for a budget".to_string());
        };
        if target == 0 || target > cli.max_periods {
            return Err("--target-months must be between 1 and --max-periods".to_string());
        }
        if !cli.solver_tolerance.is_finite() || cli.solver_tolerance <= 0.0 {
            return Err("--solver-tolerance must be > 0".to_string());
        }
    }

    validate_accounts(&cli.accounts).map_err(|e| e.to_string())?;

    Ok(PlanRequest {
        accounts: cli.accounts,
        strategy: cli.strategy.into(),
        monthly_budget,
        options: SimulationOptions {
            max_periods: cli.max_periods,
            surplus: if cli.cascade_surplus {
                SurplusAllocation::Cascade
            } else {
                SurplusAllocation::SingleTarget
            },
            ..SimulationOptions::default()
        },
        mode,
        target_months: cli.target_months,
        solver_tolerance: cli.solver_tolerance,
    })
}

fn cli_mode(cli: &Cli) -> AnalysisMode {
    if cli.target_months.is_some() {
        AnalysisMode::SolveBudget
    } else if cli.compare {
        AnalysisMode::Compare
    } else {
        AnalysisMode::SinglePlan
    }
}

fn run_plan(request: &PlanRequest) -> Result<PlanResponse, InputError> {
    match request.mode {
        AnalysisMode::SinglePlan => simulate(
            &request.accounts,
            request.strategy,
            request.monthly_budget,
            &request.options,
        )
        .map(PlanResponse::Payoff),
        AnalysisMode::Compare => {
            compare_strategies(&request.accounts, request.monthly_budget, &request.options)
                .map(PlanResponse::Comparison)
        }
        AnalysisMode::SolveBudget => {
            let target_months = request.target_months.unwrap_or(request.options.max_periods);
            let config = BudgetSolveConfig {
                tolerance: request.solver_tolerance,
                options: request.options,
                ..BudgetSolveConfig::new(target_months)
            };
            solve_budget(&request.accounts, request.strategy, config).map(PlanResponse::Budget)
        }
    }
}

/// Parse command-line arguments, run the requested plan and return it as
/// pretty-printed JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => return Err(e.to_string()),
    };
    if let Err(e) = crate::logging::init_logging(&cli.log_level) {
        eprintln!("Warning: logging not initialized: {e}");
    }

    let mode = cli_mode(&cli);
    let request = build_plan(cli, mode)?;
    let response = run_plan(&request).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to encode report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/payoff", post(payoff_handler))
        .route("/api/compare", post(compare_handler))
        .route("/api/solve-budget", post(solve_budget_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "payoff HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn payoff_handler(Json(payload): Json<PayoffPayload>) -> Response {
    plan_handler_impl(payload, AnalysisMode::SinglePlan)
}

async fn compare_handler(Json(payload): Json<PayoffPayload>) -> Response {
    plan_handler_impl(payload, AnalysisMode::Compare)
}

async fn solve_budget_handler(Json(payload): Json<PayoffPayload>) -> Response {
    plan_handler_impl(payload, AnalysisMode::SolveBudget)
}

fn plan_handler_impl(payload: PayoffPayload, mode: AnalysisMode) -> Response {
    let request = match api_request_from_payload(payload, mode) {
        Ok(request) => request,
        Err(msg) => {
            warn!(%msg, "rejected payoff request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match run_plan(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(e) => {
            warn!(error = %e, "payoff request failed validation");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str, mode: AnalysisMode) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PayoffPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, mode)
}

fn api_request_from_payload(
    payload: PayoffPayload,
    mode: AnalysisMode,
) -> Result<PlanRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.accounts {
        cli.accounts = v.into_iter().map(Account::from).collect();
    }
    if let Some(v) = payload.monthly_budget {
        cli.budget = Some(v);
    }
    if let Some(v) = payload.strategy {
        cli.strategy = v.into();
    }
    if let Some(v) = payload.max_periods {
        cli.max_periods = v;
    }
    if let Some(v) = payload.cascade_surplus {
        cli.cascade_surplus = v;
    }
    if let Some(v) = payload.target_months {
        cli.target_months = Some(v);
    }
    if let Some(v) = payload.solver_tolerance {
        cli.solver_tolerance = v;
    }

    build_plan(cli, mode).map_err(|msg| {
        msg.replace("--account", "accounts")
            .replace("--budget", "monthlyBudget")
            .replace("--max-periods", "maxPeriods")
            .replace("--target-months", "targetMonths")
            .replace("--solver-tolerance", "solverTolerance")
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        accounts: Vec::new(),
        budget: None,
        strategy: CliStrategy::Avalanche,
        max_periods: DEFAULT_MAX_PERIODS,
        cascade_surplus: false,
        compare: false,
        target_months: None,
        solver_tolerance: 1.0,
        log_level: "warn".to_string(),
    }
}
