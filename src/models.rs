use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Bill reference as it appears on a roll-call vote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillRef {
    pub congress: u32,
    pub number: u32,
    #[serde(rename = "type")]
    pub bill_type: String, // "hr" | "hjres" | "s" | "sjres" | ...
}

impl BillRef {
    /// Store identifier, e.g. `{"congress":119,"number":25,"type":"HR"}` -> `hr25-119`.
    pub fn bill_id(&self) -> String {
        format!("{}{}-{}", self.bill_type.to_lowercase(), self.number, self.congress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_id: Option<String>,
    pub bill: BillRef,
    pub vote: String, // raw cast text: "Yea", "Nay", "Not Voting", ...
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegislatorVoteLedger {
    pub member_id: String,
    pub name: String,
    pub party: String,
    pub state: String,
    pub votes: Vec<VoteRecord>,
}

/// One row of the legislator registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub member_id: String,
    #[serde(default)]
    pub bioguide: Option<String>,
    #[serde(default)]
    pub lis: Option<String>,
    #[serde(default)]
    pub current: bool,
}

/// A bill's lean within one policy category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRating {
    pub name: String,
    pub partisan_score: f64, // [-1.0 left, +1.0 right]
    pub impact_score: f64,   // [0.0, 1.0]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakeholderSupport {
    pub yes_vote: Vec<String>,
    pub no_vote: Vec<String>,
}

/// Validated classification of one bill by one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillClassification {
    pub bill_id: String,
    pub model: String,
    pub schema_version: u32,
    pub congress: Option<u32>,
    pub chamber: Option<String>,
    pub bill_type: Option<String>,
    pub primary_categories: Vec<CategoryRating>,
    pub subcategories: Vec<CategoryRating>,
    pub stakeholders: StakeholderSupport,
}

/// `bill_id -> classification` for one partition.
pub type ClassificationLookup = HashMap<String, BillClassification>;

/// The two taxonomies scored on every profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    PrimaryCategories,
    Subcategories,
}

impl CategoryField {
    pub const ALL: [CategoryField; 2] = [CategoryField::PrimaryCategories, CategoryField::Subcategories];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryField::PrimaryCategories => "primary_categories",
            CategoryField::Subcategories => "subcategories",
        }
    }
}

impl std::fmt::Display for CategoryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    pub bills: Vec<String>,
    pub bill_count: usize,

    // Filled in by ranking; absent when below the evidence threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_rank: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_rank: Option<i64>, // -1 when not in the current population
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_percentile_rank: Option<f64>, // -1.0 when not current
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_members: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_current_members: Option<usize>,
}

impl CategoryScore {
    pub fn unranked(score: f64, bills: Vec<String>) -> Self {
        let bill_count = bills.len();
        Self {
            score,
            bills,
            bill_count,
            rank: None,
            percentile_rank: None,
            current_rank: None,
            current_percentile_rank: None,
            total_members: None,
            total_current_members: None,
        }
    }
}

pub type CategoryScores = BTreeMap<String, CategoryScore>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegislatorProfile {
    pub member_id: String,
    pub name: String,
    pub party: String,
    pub state: String,

    pub model: String,
    pub schema_version: u32,
    pub spec_hash: String,

    pub vote_count: usize,

    #[serde(default)]
    pub primary_categories: CategoryScores,
    #[serde(default)]
    pub subcategories: CategoryScores,

    /// Stamped by the store on write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl LegislatorProfile {
    pub fn categories(&self, field: CategoryField) -> &CategoryScores {
        match field {
            CategoryField::PrimaryCategories => &self.primary_categories,
            CategoryField::Subcategories => &self.subcategories,
        }
    }

    pub fn categories_mut(&mut self, field: CategoryField) -> &mut CategoryScores {
        match field {
            CategoryField::PrimaryCategories => &mut self.primary_categories,
            CategoryField::Subcategories => &mut self.subcategories,
        }
    }
}
