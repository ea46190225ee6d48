//! Field team records and the load boundary.
//!
//! Loaders hand over loosely shaped [`CandidateRecord`]s. They are validated
//! once, here, into [`Candidate`]s; the rest of the crate only ever sees the
//! typed form.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FilterInputError;
use crate::geometry::GeoPoint;
use crate::traits::CandidateSource;

/// Identifier of a field team, unique within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub i64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Employment relationship of a field team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractorCategory {
    /// Directly employed.
    Direct,
    /// Sub-contracted.
    External,
}

impl ContractorCategory {
    /// Maps the loader's internal-contractor flag (1 = direct, 0 = external).
    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            1 => Some(ContractorCategory::Direct),
            0 => Some(ContractorCategory::External),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContractorCategory::Direct => "Direct",
            ContractorCategory::External => "Contractor",
        }
    }
}

/// A field team that may be sent to a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub business_unit: Option<String>,
    pub category: ContractorCategory,
    /// Missing when the team's postcode could not be resolved by the loader.
    pub location: Option<GeoPoint>,
    pub postcode: String,
}

/// A candidate row as delivered by a loader, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub internal_contractor: Option<i64>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl TryFrom<CandidateRecord> for Candidate {
    type Error = FilterInputError;

    fn try_from(record: CandidateRecord) -> Result<Self, Self::Error> {
        let id = CandidateId(record.id);

        let category = record
            .internal_contractor
            .and_then(ContractorCategory::from_flag)
            .ok_or(FilterInputError::UnknownCategory {
                id,
                flag: record.internal_contractor,
            })?;

        let location = match (record.latitude, record.longitude) {
            (Some(lat), Some(lon)) => {
                let point = GeoPoint::new(lat, lon);
                if !point.is_valid() {
                    return Err(FilterInputError::InvalidCoordinate { id, lat, lon });
                }
                Some(point)
            }
            (None, None) => None,
            _ => return Err(FilterInputError::PartialCoordinate { id }),
        };

        let business_unit = record
            .business_unit
            .map(|bu| bu.trim().to_string())
            .filter(|bu| !bu.is_empty());

        Ok(Candidate {
            id,
            name: record.name,
            business_unit,
            category,
            location,
            postcode: record
                .postcode
                .map(|pc| pc.trim().to_uppercase())
                .unwrap_or_default(),
        })
    }
}

/// Read-only snapshot of validated candidates, shared across queries.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Arc<[Candidate]>,
}

impl CandidatePool {
    /// Validates raw records, skipping malformed rows and duplicate ids.
    pub fn from_records(records: impl IntoIterator<Item = CandidateRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut skipped = 0usize;

        for record in records {
            let candidate = match Candidate::try_from(record) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(error = %err, "skipping candidate record");
                    skipped += 1;
                    continue;
                }
            };
            if !seen.insert(candidate.id) {
                warn!(error = %FilterInputError::DuplicateId { id: candidate.id }, "skipping candidate record");
                skipped += 1;
                continue;
            }
            candidates.push(candidate);
        }

        debug!(loaded = candidates.len(), skipped, "candidate pool built");
        Self {
            candidates: candidates.into(),
        }
    }

    /// Reads a JSON array of [`CandidateRecord`]s.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        let records: Vec<CandidateRecord> = serde_json::from_reader(reader)?;
        Ok(Self::from_records(records))
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl From<Vec<Candidate>> for CandidatePool {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: candidates.into(),
        }
    }
}

/// A [`CandidateSource`] over records already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandidates {
    records: Vec<CandidateRecord>,
}

impl InMemoryCandidates {
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        Self { records }
    }
}

impl CandidateSource for InMemoryCandidates {
    type Error = std::convert::Infallible;

    fn load_candidates(&self) -> Result<CandidatePool, Self::Error> {
        Ok(CandidatePool::from_records(self.records.iter().cloned()))
    }
}

/// Sorted, distinct business units present in `candidates`.
pub fn business_units<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> Vec<String> {
    candidates
        .into_iter()
        .filter_map(|c| c.business_unit.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
