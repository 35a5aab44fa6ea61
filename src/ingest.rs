use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::api_types::{ApiBill, ApiClassification, ApiLedger, ApiLegislator, ApiVote, SchemaGeneration};
use crate::error::{IdeologyError, Result};
use crate::models::{
    BillClassification, BillRef, CategoryRating, ClassificationLookup, LegislatorVoteLedger, RegistryEntry,
    StakeholderSupport, VoteRecord,
};
use crate::spec::Partition;
use crate::store::{RecordStore, BILL_ANALYSES, LEGISLATORS, MEMBER_VOTES};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub quarantined: usize,
    pub dropped_categories: usize,
    pub dropped_stakeholders: usize,
    /// Valid, but another model/schema/filter set.
    pub out_of_partition: usize,
    /// Later documents for a bill already seen.
    pub duplicates: usize,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/* -------------------------------------------------------------------------- */
/* Classifications                                                            */
/* -------------------------------------------------------------------------- */

fn score_field(entry: &Value, field: &str) -> Option<f64> {
    match entry.get(field) {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
}

fn parse_rating(entry: &Value, bill_id: &str) -> Option<CategoryRating> {
    let Some(obj) = entry.as_object() else {
        warn!("Category entry is not an object - bill_id={}, entry={}", bill_id, entry);
        return None;
    };

    let name = obj.get("name").and_then(Value::as_str).map(str::trim).unwrap_or("");
    if name.is_empty() {
        warn!("Category entry without name dropped - bill_id={}", bill_id);
        return None;
    }

    let partisan = score_field(entry, "partisan_score").filter(|p| p.is_finite() && (-1.0..=1.0).contains(p));
    let impact = score_field(entry, "impact_score").filter(|i| i.is_finite() && (0.0..=1.0).contains(i));

    match (partisan, impact) {
        (Some(partisan_score), Some(impact_score)) => Some(CategoryRating {
            name: name.to_string(),
            partisan_score,
            impact_score,
        }),
        _ => {
            warn!(
                "Category entry with invalid scores dropped - bill_id={}, category={}, partisan={:?}, impact={:?}",
                bill_id,
                name,
                obj.get("partisan_score"),
                obj.get("impact_score")
            );
            None
        }
    }
}

fn parse_ratings(entries: Vec<&Value>, bill_id: &str, report: &mut IngestReport) -> Vec<CategoryRating> {
    let total = entries.len();
    let ratings: Vec<CategoryRating> = entries.into_iter().filter_map(|e| parse_rating(e, bill_id)).collect();
    report.dropped_categories += total - ratings.len();
    ratings
}

fn parse_stakeholders(values: &[Value], report: &mut IngestReport) -> Vec<String> {
    let names: Vec<String> = values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
    report.dropped_stakeholders += values.len() - names.len();
    names
}

/// Validate one raw classification document. Returns `None` (and counts it
/// as quarantined) when the document can't be attributed.
pub fn parse_classification(raw: &Value, report: &mut IngestReport) -> Option<BillClassification> {
    let api: ApiClassification = match serde_json::from_value(raw.clone()) {
        Ok(api) => api,
        Err(e) => {
            report.quarantined += 1;
            warn!("Classification quarantined, undecodable - error={}", e);
            return None;
        }
    };

    let (Some(bill_id), Some(model)) = (non_blank(api.bill_id), non_blank(api.model)) else {
        report.quarantined += 1;
        warn!(
            "Classification quarantined, missing bill_id or model - bill_id={:?}, model={:?}",
            raw.get("bill_id"),
            raw.get("model")
        );
        return None;
    };

    let generation = api.political_categories.generation(api.schema_version);
    let schema_version = api.schema_version.unwrap_or(match generation {
        SchemaGeneration::Nested => 3,
        SchemaGeneration::Flattened => 2,
    });

    let primary_categories = parse_ratings(api.political_categories.primary_entries(generation), &bill_id, report);
    let subcategories = parse_ratings(api.political_categories.subcategory_entries(), &bill_id, report);

    let stakeholders = StakeholderSupport {
        yes_vote: parse_stakeholders(&api.voting_analysis.yes_vote.stakeholder_support, report),
        no_vote: parse_stakeholders(&api.voting_analysis.no_vote.stakeholder_support, report),
    };

    report.accepted += 1;
    Some(BillClassification {
        bill_id,
        model,
        schema_version,
        congress: api.congress,
        chamber: non_blank(api.chamber).map(|c| c.to_lowercase()),
        bill_type: non_blank(api.bill_type).map(|t| t.to_lowercase()),
        primary_categories,
        subcategories,
        stakeholders,
    })
}

/// Every valid classification in the store, in store order.
pub fn load_all_classifications<S: RecordStore + ?Sized>(store: &S) -> Result<(Vec<BillClassification>, IngestReport)> {
    let start = Instant::now();
    let docs = store.find(BILL_ANALYSES)?;
    let mut report = IngestReport::default();

    let classifications: Vec<BillClassification> =
        docs.iter().filter_map(|d| parse_classification(d, &mut report)).collect();

    info!(
        "Classifications ingested - duration={:.2}s, documents={}, accepted={}, quarantined={}, dropped_categories={}",
        start.elapsed().as_secs_f32(),
        docs.len(),
        report.accepted,
        report.quarantined,
        report.dropped_categories
    );
    Ok((classifications, report))
}

/// Restrict to one partition. The first classification of a bill wins.
pub fn lookup_for(
    classifications: &[BillClassification],
    partition: &Partition,
    report: &mut IngestReport,
) -> ClassificationLookup {
    let mut lookup = ClassificationLookup::new();
    for c in classifications {
        if !partition.admits(c) {
            report.out_of_partition += 1;
            continue;
        }
        if lookup.contains_key(&c.bill_id) {
            report.duplicates += 1;
            debug!("Duplicate classification ignored - bill_id={}, model={}", c.bill_id, c.model);
            continue;
        }
        lookup.insert(c.bill_id.clone(), c.clone());
    }
    lookup
}

/// Classification lookup for a partition; `EmptyResultSet` when nothing matches.
pub fn load_classifications<S: RecordStore + ?Sized>(
    store: &S,
    partition: &Partition,
) -> Result<(ClassificationLookup, IngestReport)> {
    let (all, mut report) = load_all_classifications(store)?;
    let lookup = lookup_for(&all, partition, &mut report);

    if lookup.is_empty() {
        return Err(IdeologyError::EmptyResultSet { spec_hash: partition.spec_hash() });
    }

    debug!(
        "Partition lookup built - spec_hash={}, bills={}, out_of_partition={}, duplicates={}",
        partition.spec_hash(),
        lookup.len(),
        report.out_of_partition,
        report.duplicates
    );
    Ok((lookup, report))
}

/* -------------------------------------------------------------------------- */
/* Vote ledgers                                                               */
/* -------------------------------------------------------------------------- */

fn parse_bill(bill: Option<ApiBill>) -> Option<BillRef> {
    let bill = bill?;
    Some(BillRef {
        congress: bill.congress?,
        number: bill.number?,
        bill_type: non_blank(bill.bill_type)?,
    })
}

/// Decode one ledger; votes without a complete bill reference are skipped.
pub fn parse_ledger(raw: &Value) -> Option<LegislatorVoteLedger> {
    let api: ApiLedger = match serde_json::from_value(raw.clone()) {
        Ok(api) => api,
        Err(e) => {
            warn!("Vote ledger skipped, undecodable - error={}", e);
            return None;
        }
    };

    let Some(member_id) = non_blank(api.member_id) else {
        warn!("Vote ledger skipped, missing member_id - name={:?}", api.name);
        return None;
    };

    let total = api.votes.len();
    let votes: Vec<VoteRecord> = api
        .votes
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ApiVote>(v).ok())
        .filter_map(|v| {
            Some(VoteRecord {
                vote_id: non_blank(v.vote_id),
                bill: parse_bill(v.bill)?,
                vote: v.vote,
            })
        })
        .collect();

    if votes.len() < total {
        debug!(
            "Votes without a usable bill skipped - member_id={}, skipped={}",
            member_id,
            total - votes.len()
        );
    }

    Some(LegislatorVoteLedger {
        member_id,
        name: api.name.unwrap_or_default(),
        party: non_blank(api.party).unwrap_or_default(),
        state: api.state.unwrap_or_default(),
        votes,
    })
}

pub fn load_ledgers<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<LegislatorVoteLedger>> {
    let start = Instant::now();
    let docs = store.find(MEMBER_VOTES)?;
    let ledgers: Vec<LegislatorVoteLedger> = docs.iter().filter_map(parse_ledger).collect();

    info!(
        "Vote ledgers loaded - duration={:.2}s, documents={}, ledgers={}, votes={}",
        start.elapsed().as_secs_f32(),
        docs.len(),
        ledgers.len(),
        ledgers.iter().map(|l| l.votes.len()).sum::<usize>()
    );
    Ok(ledgers)
}

/* -------------------------------------------------------------------------- */
/* Registry                                                                   */
/* -------------------------------------------------------------------------- */

/// Decode one registry row. Aliases may sit at the top level or under `id`;
/// a row without `member_id` falls back to its LIS id, then its bioguide id.
pub fn parse_legislator(raw: &Value) -> Option<RegistryEntry> {
    let api: ApiLegislator = match serde_json::from_value(raw.clone()) {
        Ok(api) => api,
        Err(e) => {
            warn!("Registry row skipped, undecodable - error={}", e);
            return None;
        }
    };

    let nested = api.id.unwrap_or_default();
    let bioguide = non_blank(api.bioguide).or_else(|| non_blank(nested.bioguide));
    let lis = non_blank(api.lis).or_else(|| non_blank(nested.lis));

    let Some(member_id) = non_blank(api.member_id).or_else(|| lis.clone()).or_else(|| bioguide.clone()) else {
        warn!("Registry row skipped, no usable id");
        return None;
    };

    Some(RegistryEntry {
        member_id,
        bioguide,
        lis,
        current: api.current,
    })
}

pub fn load_registry<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<RegistryEntry>> {
    let docs = store.find(LEGISLATORS)?;
    let entries: Vec<RegistryEntry> = docs.iter().filter_map(parse_legislator).collect();
    debug!("Registry loaded - documents={}, entries={}", docs.len(), entries.len());
    Ok(entries)
}
