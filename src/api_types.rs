use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiClassification {
    #[serde(default)]
    pub bill_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub schema_version: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub congress: Option<u32>, // stored as "119" by the scraper
    #[serde(default)]
    pub chamber: Option<String>,
    #[serde(default)]
    pub bill_type: Option<String>,
    #[serde(default)]
    pub political_categories: ApiPoliticalCategories,
    #[serde(default)]
    pub voting_analysis: ApiVotingAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    Flattened,
    Nested,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPoliticalCategories {
    /// schema >= 3
    #[serde(default)]
    pub primary_categories: Option<Vec<Value>>,
    /// schema <= 2
    #[serde(default)]
    pub primary: Option<Value>,
    /// schema <= 2
    #[serde(default)]
    pub secondary: Option<Vec<Value>>,
    #[serde(default)]
    pub subcategories: Option<Vec<Value>>,
}

impl ApiPoliticalCategories {
    /// Generation declared by `schema_version`, or inferred from shape when
    /// the version is missing.
    pub fn generation(&self, schema_version: Option<u32>) -> SchemaGeneration {
        match schema_version {
            Some(v) if v >= 3 => SchemaGeneration::Nested,
            Some(_) => SchemaGeneration::Flattened,
            None if self.primary_categories.is_some() => SchemaGeneration::Nested,
            None => SchemaGeneration::Flattened,
        }
    }

    /// Primary-level entries for the given generation. Falls back to the
    /// other generation's fields when the declared ones are absent.
    pub fn primary_entries(&self, generation: SchemaGeneration) -> Vec<&Value> {
        let nested = || self.primary_categories.as_ref().map(|v| v.iter().collect::<Vec<_>>());
        let flattened = || {
            if self.primary.is_none() && self.secondary.is_none() {
                return None;
            }
            let mut out: Vec<&Value> = self.primary.iter().collect();
            out.extend(self.secondary.iter().flatten());
            Some(out)
        };

        match generation {
            SchemaGeneration::Nested => nested().or_else(flattened),
            SchemaGeneration::Flattened => flattened().or_else(nested),
        }
        .unwrap_or_default()
    }

    pub fn subcategory_entries(&self) -> Vec<&Value> {
        self.subcategories.iter().flatten().collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiVotingAnalysis {
    #[serde(default)]
    pub yes_vote: ApiVoteRationale,
    #[serde(default)]
    pub no_vote: ApiVoteRationale,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiVoteRationale {
    #[serde(default)]
    pub stakeholder_support: Vec<Value>, // strings expected; anything else is dropped
}

/* -------------------------------------------------------------------------- */
/* Vote ledgers                                                               */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLedger {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub votes: Vec<Value>, // decoded one by one so a bad vote doesn't sink the ledger
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVote {
    #[serde(default)]
    pub vote_id: Option<String>,
    #[serde(default)]
    pub bill: Option<ApiBill>,
    #[serde(default)]
    pub vote: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBill {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub congress: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub number: Option<u32>,
    #[serde(default, rename = "type")]
    pub bill_type: Option<String>,
}

/* -------------------------------------------------------------------------- */
/* Registry                                                                   */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLegislator {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub bioguide: Option<String>,
    #[serde(default)]
    pub lis: Option<String>,
    /// Older registry dumps nest the aliases under `id`.
    #[serde(default)]
    pub id: Option<ApiLegislatorIds>,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiLegislatorIds {
    #[serde(default)]
    pub bioguide: Option<String>,
    #[serde(default)]
    pub lis: Option<String>,
}

/// Accepts `119`, `"119"` or null.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected numeric string, got '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!("expected number, got {}", other))),
    }
}
