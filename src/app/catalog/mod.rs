//! Model templates: per-model URL conventions behind one trait
//!
//! The retrieval engine never builds archive URLs itself. Each model is
//! described by a [`ModelTemplate`] registered by explicit identifier in a
//! [`ModelRegistry`]; third-party models plug in through
//! [`ModelRegistry::register`].

use chrono::Duration as ChronoDuration;

use crate::app::inventory::IndexGrammar;
use crate::app::models::{Location, Request, SourceCandidate};
use crate::constants::sources;
use crate::errors::{ResolveError, ResolveResult};

pub mod ecmwf;
pub mod noaa;
pub mod registry;

pub use registry::ModelRegistry;

/// Read-only descriptor of one model's products, sources and index conventions
pub trait ModelTemplate: Send + Sync {
    /// Registry identifier, lowercase
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Documentation links as `(label, url)` pairs
    fn details(&self) -> &[(&str, &str)] {
        &[]
    }

    /// Product identifiers and descriptions; the first is the default
    fn products(&self) -> &[(&str, &str)];

    /// Candidate sources in preferred order for a request and product
    fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate>;

    /// Index suffixes tried in order
    fn index_suffixes(&self) -> &[&str] {
        &[".grib2.idx"]
    }

    fn index_grammar(&self) -> IndexGrammar {
        IndexGrammar::Wgrib2
    }

    /// Whether remote sources are expected to publish an index
    fn expects_index(&self) -> bool {
        true
    }

    /// Spacing between model runs, used by latest-run discovery
    fn cycle_interval(&self) -> ChronoDuration {
        ChronoDuration::hours(1)
    }

    /// File name used for the full local artifact
    ///
    /// Defaults to the remote file name of the first source.
    fn local_file_name(&self, request: &Request, product: &str) -> String {
        self.sources(request, product)
            .first()
            .and_then(|candidate| candidate.primary.rsplit('/').next().map(str::to_string))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}.t{}z.{}.f{:03}.grib2",
                    self.name(),
                    request.hour_stamp(),
                    product,
                    request.fxx()
                )
            })
    }

    /// Default product identifier
    fn default_product(&self) -> Option<&str> {
        self.products().first().map(|(id, _)| *id)
    }
}

/// Product requested, or the template default, checked against the template
pub fn resolve_product(template: &dyn ModelTemplate, request: &Request) -> ResolveResult<String> {
    let available = || {
        template
            .products()
            .iter()
            .map(|(id, _)| *id)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let product = match request.product() {
        Some(product) => product,
        None => template
            .default_product()
            .ok_or_else(|| ResolveError::UnknownProduct {
                model: template.name().to_string(),
                product: "<default>".to_string(),
                available: available(),
            })?,
    };

    if template.products().iter().any(|(id, _)| *id == product) {
        Ok(product.to_string())
    } else {
        Err(ResolveError::UnknownProduct {
            model: template.name().to_string(),
            product: product.to_string(),
            available: available(),
        })
    }
}

/// Candidate index locations for a primary file, one per suffix
///
/// GRIB extensions are replaced by the suffix; anything else gets the
/// suffix appended.
pub fn index_locations(primary: &Location, suffixes: &[&str]) -> Vec<Location> {
    suffixes
        .iter()
        .filter_map(|suffix| {
            let raw = primary.as_string();
            let stem = sources::GRIB_EXTENSIONS
                .iter()
                .find_map(|ext| raw.strip_suffix(*ext))
                .unwrap_or(raw.as_str());
            Location::parse(&format!("{}{}", stem, suffix)).ok()
        })
        .collect()
}
