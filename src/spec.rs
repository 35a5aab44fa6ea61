use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::{IdeologyError, Result};
use crate::models::BillClassification;

/// Latest classification schema; used whenever a caller doesn't pick one.
pub const SCHEMA_VERSION: u32 = 3;

/// Earliest congress with roll-call data in the store.
pub const MIN_CONGRESS: u32 = 113;

const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
}

static LIS_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S\d{1,3}$").expect("valid LIS pattern"));

impl Chamber {
    pub const ALL: [Chamber; 2] = [Chamber::House, Chamber::Senate];

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "house" => Ok(Chamber::House),
            "senate" => Ok(Chamber::Senate),
            _ => Err(IdeologyError::InvalidFilterInput {
                field: "chamber",
                value: raw.to_string(),
                expected: "one of house, senate",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::House => "house",
            Chamber::Senate => "senate",
        }
    }

    /// Senate canonical ids are LIS ids (`S313`); house members keep their
    /// bioguide id (`A000360`).
    pub fn of_member_id(member_id: &str) -> Chamber {
        if LIS_ID.is_match(member_id) {
            Chamber::Senate
        } else {
            Chamber::House
        }
    }
}

impl std::fmt::Display for Chamber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bill types with the force of law. Simple and concurrent resolutions are
/// never scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    Hr,
    Hjres,
    S,
    Sjres,
}

impl BillType {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "hr" => Ok(BillType::Hr),
            "hjres" => Ok(BillType::Hjres),
            "s" => Ok(BillType::S),
            "sjres" => Ok(BillType::Sjres),
            _ => Err(IdeologyError::InvalidFilterInput {
                field: "bill_type",
                value: raw.to_string(),
                expected: "one of hr, hjres, s, sjres",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Hr => "hr",
            BillType::Hjres => "hjres",
            BillType::S => "s",
            BillType::Sjres => "sjres",
        }
    }
}

// Ordered by name so the joined key is alphabetical.
impl Ord for BillType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for BillType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Validated optional filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filters {
    pub congress: Option<u32>,
    pub chamber: Option<Chamber>,
    pub bill_types: BTreeSet<BillType>,
}

impl Filters {
    /// Validate raw caller input. Blank chamber strings count as "no filter".
    pub fn parse<S: AsRef<str>>(
        congress: Option<u32>,
        chamber: Option<&str>,
        bill_types: &[S],
    ) -> Result<Self> {
        if let Some(c) = congress {
            if c < MIN_CONGRESS {
                return Err(IdeologyError::InvalidFilterInput {
                    field: "congress",
                    value: c.to_string(),
                    expected: "a congress number of at least 113",
                });
            }
        }

        let chamber = match chamber.map(str::trim) {
            Some(ch) if !ch.is_empty() => Some(Chamber::parse(ch)?),
            _ => None,
        };

        let bill_types = bill_types
            .iter()
            .map(|bt| BillType::parse(bt.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self {
            congress,
            chamber,
            bill_types,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub model: String,
    pub schema_version: u32,
    pub filters: Filters,
}

impl Partition {
    pub fn new(model: &str, schema_version: Option<u32>, filters: Filters) -> Result<Self> {
        let model = model.trim();
        if model.is_empty() {
            return Err(IdeologyError::InvalidFilterInput {
                field: "model",
                value: model.to_string(),
                expected: "a non-empty model identifier",
            });
        }
        Ok(Self {
            model: model.to_string(),
            schema_version: schema_version.unwrap_or(SCHEMA_VERSION),
            filters,
        })
    }

    pub fn spec_hash(&self) -> String {
        let bill_types: Vec<&str> = self.filters.bill_types.iter().map(BillType::as_str).collect();
        spec_hash(
            &self.model,
            Some(self.schema_version),
            self.filters.congress,
            self.filters.chamber.map(|c| c.as_str()),
            bill_types.as_slice(),
        )
    }

    pub fn chamber(&self) -> Option<Chamber> {
        self.filters.chamber
    }

    /// Whether a classification belongs to this partition. Chamber is a
    /// legislator filter and does not restrict bills.
    pub fn admits(&self, c: &BillClassification) -> bool {
        if c.model != self.model || c.schema_version != self.schema_version {
            return false;
        }
        if let Some(congress) = self.filters.congress {
            if c.congress != Some(congress) {
                return false;
            }
        }
        if !self.filters.bill_types.is_empty() {
            let admitted = c
                .bill_type
                .as_deref()
                .and_then(|bt| BillType::parse(bt).ok())
                .map(|bt| self.filters.bill_types.contains(&bt))
                .unwrap_or(false);
            if !admitted {
                return false;
            }
        }
        true
    }
}

/// Build the partition key from unvalidated parts.
///
/// `spec_hash("m1", Some(3), None, Some("house"), &[])` is `"m1_3_all_house_all"`.
pub fn spec_hash<S: AsRef<str>>(
    model: &str,
    schema_version: Option<u32>,
    congress: Option<u32>,
    chamber: Option<&str>,
    bill_types: &[S],
) -> String {
    let schema = schema_version.unwrap_or(SCHEMA_VERSION);

    let congress = congress.map(|c| c.to_string()).unwrap_or_else(|| ALL.to_string());

    let chamber = chamber
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| ALL.to_string());

    let types: BTreeSet<String> = bill_types
        .iter()
        .map(|bt| bt.as_ref().trim().to_lowercase())
        .filter(|bt| !bt.is_empty())
        .collect();
    let types = if types.is_empty() {
        ALL.to_string()
    } else {
        types.into_iter().collect::<Vec<_>>().join(",")
    };

    format!("{}_{}_{}_{}_{}", model, schema, congress, chamber, types)
}
