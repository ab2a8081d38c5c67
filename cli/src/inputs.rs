//! Rate, loan and batch input files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use moneta_debt::DebtSnapshot;
use moneta_fx::{AggregatedRateProvider, BatchEntry, RateProvider, StaticRateProvider};
use tracing::info;

/// Build a provider from one or more JSON rate files.
///
/// Several files are aggregated: each pair is quoted at the median of the
/// files that carry it.
pub fn load_provider(paths: &[PathBuf]) -> anyhow::Result<Arc<dyn RateProvider>> {
    let mut providers: Vec<Arc<dyn RateProvider>> = Vec::with_capacity(paths.len());

    for path in paths {
        let json = read(path)?;
        let name = path.display().to_string();
        let provider = StaticRateProvider::from_json(name, &json)
            .with_context(|| format!("loading rates from {}", path.display()))?;
        providers.push(Arc::new(provider));
    }

    info!(files = providers.len(), "Rate providers loaded");

    match providers.len() {
        0 => Err(anyhow!("no rate file given; pass --rates <FILE>")),
        1 => Ok(providers.remove(0)),
        _ => Ok(Arc::new(AggregatedRateProvider::new(providers))),
    }
}

/// Load a user's loans and income.
pub fn load_loans(path: &Path) -> anyhow::Result<DebtSnapshot> {
    let json = read(path)?;
    let snapshot: DebtSnapshot = serde_json::from_str(&json)
        .with_context(|| format!("parsing loans from {}", path.display()))?;

    info!(loans = snapshot.loans.len(), "Loans loaded");
    Ok(snapshot)
}

/// Load batch conversion entries.
pub fn load_batch(path: &Path) -> anyhow::Result<Vec<BatchEntry>> {
    let json = read(path)?;
    serde_json::from_str(&json).with_context(|| format!("parsing batch from {}", path.display()))
}

/// Split `BASE/QUOTE` into its codes.
pub fn parse_pair(pair: &str) -> anyhow::Result<(String, String)> {
    pair.split_once('/')
        .map(|(base, quote)| (base.trim().to_string(), quote.trim().to_string()))
        .ok_or_else(|| anyhow!("expected a pair like USD/EUR, got {}", pair))
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
