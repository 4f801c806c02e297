//! Startup catalog loading.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use quiz::Catalog;

/// Built-in catalog, used when no file is configured.
const DEFAULT_CATALOG: &str = include_str!("../defaults/catalog.json");

/// Load and validate the level catalog. A malformed catalog is fatal.
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<Arc<Catalog>> {
    let catalog = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog {}", path.display()))?;
            Catalog::from_json(&json)
                .with_context(|| format!("Invalid catalog {}", path.display()))?
        }
        None => Catalog::from_json(DEFAULT_CATALOG).context("Invalid built-in catalog")?,
    };

    tracing::info!(
        version = catalog.version(),
        levels = catalog.len(),
        max_score = catalog.max_score(),
        source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".into()),
        "Catalog loaded"
    );
    Ok(Arc::new(catalog))
}
