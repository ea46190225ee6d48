//! Attribute and isochrone-band filtering of the candidate pool.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidate::{Candidate, ContractorCategory};
use crate::error::ConfigurationError;
use crate::isochrone::IsochroneSet;

/// Which contractor categories a query accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategorySelector {
    #[default]
    Either,
    Direct,
    External,
}

impl CategorySelector {
    pub fn accepts(&self, category: ContractorCategory) -> bool {
        match self {
            CategorySelector::Either => true,
            CategorySelector::Direct => category == ContractorCategory::Direct,
            CategorySelector::External => category == ContractorCategory::External,
        }
    }
}

/// Per-query filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Exact business unit to keep; `None` keeps every unit.
    pub business_unit: Option<String>,
    pub category: CategorySelector,
    /// Threshold of the isochrone band candidates must lie in.
    pub band_minutes: u32,
}

impl FilterCriteria {
    pub fn new(band_minutes: u32) -> Self {
        Self {
            business_unit: None,
            category: CategorySelector::Either,
            band_minutes,
        }
    }

    /// Criteria selecting the widest band available, with no attribute filters.
    pub fn for_widest_band(bands: &IsochroneSet) -> Option<Self> {
        bands.widest().map(|band| Self::new(band.minutes()))
    }

    pub fn with_business_unit(mut self, business_unit: impl Into<String>) -> Self {
        self.business_unit = Some(business_unit.into());
        self
    }

    pub fn with_category(mut self, category: CategorySelector) -> Self {
        self.category = category;
        self
    }
}

/// Keeps the candidates that satisfy `criteria` and lie inside the selected band.
///
/// Steps run in order and stop as soon as nothing is left: candidates without
/// a location, business unit, contractor category, then band membership. The
/// band is resolved before any step so that missing band data is reported as
/// such rather than as an empty result.
pub fn filter_candidates<'a>(
    candidates: &'a [Candidate],
    criteria: &FilterCriteria,
    bands: &IsochroneSet,
) -> Result<Vec<&'a Candidate>, ConfigurationError> {
    let band = bands.band(criteria.band_minutes)?;

    let mut kept: Vec<&Candidate> = candidates.iter().filter(|c| c.location.is_some()).collect();

    if let Some(unit) = &criteria.business_unit {
        if !kept.is_empty() {
            kept.retain(|c| c.business_unit.as_deref() == Some(unit.as_str()));
        }
    }

    if criteria.category != CategorySelector::Either && !kept.is_empty() {
        kept.retain(|c| criteria.category.accepts(c.category));
    }

    if !kept.is_empty() {
        kept.retain(|c| {
            c.location
                .map(|point| band.contains(point.project()))
                .unwrap_or(false)
        });
    }

    debug!(
        band = criteria.band_minutes,
        pool = candidates.len(),
        kept = kept.len(),
        "filtered candidates"
    );
    Ok(kept)
}
