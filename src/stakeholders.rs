use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::ideology::vote_direction;
use crate::models::{ClassificationLookup, LegislatorVoteLedger};
use crate::spec::{Chamber, Partition};
use crate::store::RecordKey;

/// Minimum mentions for a group to be kept.
const MIN_MENTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeholderFrequency {
    pub member_id: String,
    pub spec_hash: String,
    pub counts: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl StakeholderFrequency {
    pub fn key(&self) -> RecordKey {
        RecordKey::new()
            .with("member_id", &self.member_id)
            .with("spec_hash", &self.spec_hash)
    }
}

/// NFC, trimmed, inner whitespace collapsed. `None` for blank names.
pub fn normalize_name(raw: &str) -> Option<String> {
    let nfc: String = raw.nfc().collect();
    let name = nfc.split_whitespace().collect::<Vec<_>>().join(" ");
    (!name.is_empty()).then_some(name)
}

/// Raw mention counts for one ledger, before the minimum-mention filter.
pub fn count_mentions(ledger: &LegislatorVoteLedger, lookup: &ClassificationLookup) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();

    for record in &ledger.votes {
        let Some(classification) = lookup.get(&record.bill.bill_id()) else {
            continue;
        };
        let groups = match vote_direction(&record.vote) {
            1 => &classification.stakeholders.yes_vote,
            -1 => &classification.stakeholders.no_vote,
            _ => continue,
        };
        for name in groups.iter().filter_map(|g| normalize_name(g)) {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
    counts
}

pub fn stakeholder_frequency(
    ledger: &LegislatorVoteLedger,
    lookup: &ClassificationLookup,
    spec_hash: &str,
) -> Option<StakeholderFrequency> {
    let counts: BTreeMap<String, usize> = count_mentions(ledger, lookup)
        .into_iter()
        .filter(|&(_, n)| n >= MIN_MENTIONS)
        .collect();

    (!counts.is_empty()).then(|| StakeholderFrequency {
        member_id: ledger.member_id.clone(),
        spec_hash: spec_hash.to_string(),
        counts,
        last_modified: None,
    })
}

/// Frequencies for every ledger in the partition's chamber, sorted by
/// `member_id`. Legislators with nothing left after filtering are omitted.
pub fn find_stakeholders(
    ledgers: &[LegislatorVoteLedger],
    lookup: &ClassificationLookup,
    partition: &Partition,
) -> Vec<StakeholderFrequency> {
    let start = Instant::now();
    let spec_hash = partition.spec_hash();
    let chamber = partition.chamber();

    let mut out: Vec<StakeholderFrequency> = ledgers
        .par_iter()
        .filter(|l| chamber.map_or(true, |ch| Chamber::of_member_id(&l.member_id) == ch))
        .filter_map(|l| stakeholder_frequency(l, lookup, &spec_hash))
        .collect();
    out.sort_by(|a, b| a.member_id.cmp(&b.member_id));

    info!(
        "Stakeholders counted - duration={:.2}s, spec_hash={}, ledgers={}, legislators={}",
        start.elapsed().as_secs_f32(),
        spec_hash,
        ledgers.len(),
        out.len()
    );
    out
}
