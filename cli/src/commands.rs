//! Subcommand execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use moneta_common::{Currency, Money};
use moneta_debt::{DebtService, InMemoryLoanRepository, PayoffConfig};
use moneta_fx::{BatchOutcome, ConversionRequest, CurrencyDetector, FxEngine, FxEngineConfig};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::info;

use crate::inputs;

const CLI_USER: &str = "cli";

/// What to run.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Convert an amount to another currency
    Convert {
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Convert every entry of a JSON batch file
    Batch {
        /// JSON array of {"amount", "from", "to"}
        #[arg(long)]
        file: PathBuf,
    },

    /// Current rates for one or more BASE/QUOTE pairs
    Rate {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Daily rates over an inclusive date range
    History {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },

    /// Detect a currency from a country code or ticker symbol
    Detect {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
    },

    /// Compare snowball and avalanche payoff plans
    Payoff,

    /// Debt-to-income ratio and risk tier
    Dti,
}

/// Inputs shared by every subcommand.
pub struct RunContext {
    pub rates: Vec<PathBuf>,
    pub loans: Option<PathBuf>,
}

impl Command {
    /// Run the command and return its JSON output.
    pub async fn run(self, ctx: &RunContext) -> anyhow::Result<Value> {
        match self {
            Command::Convert { amount, from, to } => {
                let engine = fx_engine(ctx)?;
                let from = Currency::parse(&from)?;
                let to = Currency::parse(&to)?;
                let result = engine
                    .convert(ConversionRequest::new(Money::new(amount, from), to))
                    .await?;
                let warning = result.warning();
                Ok(json!({ "result": result, "warning": warning }))
            }

            Command::Batch { file } => {
                let engine = fx_engine(ctx)?;
                let entries = inputs::load_batch(&file)?;
                let outcomes: Vec<BatchOutcome> = engine
                    .convert_batch(&entries)
                    .await
                    .into_iter()
                    .map(BatchOutcome::from)
                    .collect();
                let failed = outcomes
                    .iter()
                    .filter(|o| matches!(o, BatchOutcome::Error { .. }))
                    .count();
                info!(entries = outcomes.len(), failed, "Batch complete");
                Ok(json!({ "results": outcomes, "failed": failed }))
            }

            Command::Rate { pairs } => {
                let engine = fx_engine(ctx)?;
                let pairs = pairs
                    .iter()
                    .map(|p| inputs::parse_pair(p))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let quotes = engine.get_rates(&pairs).await;
                let rows: Vec<Value> = pairs
                    .iter()
                    .zip(quotes)
                    .map(|((from, to), quote)| match quote {
                        Ok(quote) => {
                            let warning = quote.warning();
                            json!({
                                "pair": format!("{}/{}", from, to),
                                "status": "ok",
                                "quote": quote,
                                "warning": warning,
                            })
                        }
                        Err(e) => json!({
                            "pair": format!("{}/{}", from, to),
                            "status": "error",
                            "code": e.error_code(),
                            "message": e.to_string(),
                        }),
                    })
                    .collect();
                Ok(json!({ "rates": rows, "stats": engine.stats() }))
            }

            Command::History { from, to, start, end } => {
                let engine = fx_engine(ctx)?;
                let from = Currency::parse(&from)?;
                let to = Currency::parse(&to)?;
                let rates = engine.get_historical_rates(&from, &to, start, end).await?;
                Ok(serde_json::to_value(rates)?)
            }

            Command::Detect { country, symbol } => {
                let detector = CurrencyDetector::new();
                let currency = detector.detect(country.as_deref(), symbol.as_deref())?;
                Ok(json!({
                    "currency": currency,
                    "symbol": currency.symbol(),
                    "decimal_places": currency.decimal_places(),
                }))
            }

            Command::Payoff => {
                let service = debt_service(ctx)?;
                let comparison = service.payoff_strategies(CLI_USER).await?;
                let warnings: Vec<String> = [comparison.snowball.warning(), comparison.avalanche.warning()]
                    .into_iter()
                    .flatten()
                    .collect();
                Ok(json!({ "comparison": comparison, "warnings": warnings }))
            }

            Command::Dti => {
                let service = debt_service(ctx)?;
                let assessment = service.debt_to_income(CLI_USER).await?;
                Ok(serde_json::to_value(assessment)?)
            }
        }
    }
}

fn fx_engine(ctx: &RunContext) -> anyhow::Result<FxEngine> {
    let config = FxEngineConfig::from_env();
    config.validate().map_err(|e| anyhow!("invalid FX configuration: {}", e))?;

    let provider = inputs::load_provider(&ctx.rates)?;
    Ok(FxEngine::new(provider, config))
}

fn debt_service(ctx: &RunContext) -> anyhow::Result<DebtService> {
    let config = PayoffConfig::from_env();
    config.validate().map_err(|e| anyhow!("invalid payoff configuration: {}", e))?;

    let path: &Path = ctx
        .loans
        .as_deref()
        .context("no loans file given; pass --loans <FILE>")?;
    let repository = InMemoryLoanRepository::new();
    repository.insert(CLI_USER, inputs::load_loans(path)?);

    Ok(DebtService::new(Arc::new(repository), config))
}
