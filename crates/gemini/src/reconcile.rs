use std::collections::HashSet;

use bot_core::store::ConfigStore;
use tracing::{debug, info, warn};

use crate::client::GeminiRestClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The exchange publishes nothing the local config lacks.
    Unchanged,
    /// Available pairs were rewritten and persisted.
    Updated(Vec<String>),
    /// Symbols could not be fetched or the config could not be loaded or saved.
    Skipped,
}

/// Sync the persisted available pairs with the exchange's published symbols.
///
/// The published list becomes authoritative and leads the new list; pairs that were
/// configured but are no longer published are kept at the end. Enabled pairs are
/// never touched. Every failure is logged and leaves the prior config in place.
pub async fn reconcile_available_pairs(
    client: &GeminiRestClient,
    store: &dyn ConfigStore,
    available: &[String],
) -> ReconcileOutcome {
    let published = match client.get_symbols().await {
        Ok(symbols) => normalize_symbols(symbols),
        Err(err) => {
            warn!(exchange = %client.name(), error = %err, "failed to get available symbols");
            return ReconcileOutcome::Skipped;
        }
    };

    let missing = newly_published(available, &published);
    if missing.is_empty() {
        debug!(exchange = %client.name(), "available pairs up to date");
        return ReconcileOutcome::Unchanged;
    }

    let mut config = match store.get_exchange_config(client.name()).await {
        Ok(config) => config,
        Err(err) => {
            warn!(exchange = %client.name(), error = %err, "failed to load exchange config");
            return ReconcileOutcome::Skipped;
        }
    };

    let merged = merge_pairs(&published, &config.available_pairs());
    info!(
        exchange = %client.name(),
        difference = ?missing,
        "updating available pairs"
    );
    config.set_available_pairs(&merged);

    if let Err(err) = store.update_exchange_config(config).await {
        warn!(exchange = %client.name(), error = %err, "failed to persist available pairs");
        return ReconcileOutcome::Skipped;
    }

    ReconcileOutcome::Updated(merged)
}

pub fn normalize_symbols(symbols: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(|symbol| symbol.trim().to_uppercase())
        .filter(|symbol| !symbol.is_empty() && seen.insert(symbol.clone()))
        .collect()
}

/// Published symbols absent from the local list.
fn newly_published(local: &[String], published: &[String]) -> Vec<String> {
    let local: HashSet<String> = local.iter().map(|pair| pair.to_uppercase()).collect();
    published
        .iter()
        .filter(|symbol| !local.contains(*symbol))
        .cloned()
        .collect()
}

fn merge_pairs(published: &[String], configured: &[String]) -> Vec<String> {
    let mut merged = published.to_vec();
    let mut seen: HashSet<String> = published.iter().cloned().collect();
    for pair in configured {
        let pair = pair.to_uppercase();
        if seen.insert(pair.clone()) {
            merged.push(pair);
        }
    }
    merged
}
