use anyhow::{Context, Result};
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::IdeologyError;
use crate::identity::{merge_ledgers, IdentityMap};
use crate::ideology::build_profiles;
use crate::ingest::{load_all_classifications, load_classifications, load_ledgers, load_registry, lookup_for};
use crate::models::{ClassificationLookup, LegislatorProfile, LegislatorVoteLedger};
use crate::ranking::rank_profiles;
use crate::spec::{Chamber, Filters, Partition};
use crate::stakeholders::find_stakeholders;
use crate::stats::generate_stats;
use crate::store::{
    upsert_record, RecordKey, RecordStore, AGGREGATED_STATS, LEGISLATOR_PROFILES, LEGISLATOR_STAKEHOLDERS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub spec_hash: String,
    pub bills: usize,
    pub legislators: usize,
    pub written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Nothing classified for this partition; nothing was written.
    NoClassifications { spec_hash: String },
}

impl RunOutcome {
    pub fn spec_hash(&self) -> &str {
        match self {
            RunOutcome::Completed(s) => &s.spec_hash,
            RunOutcome::NoClassifications { spec_hash } => spec_hash,
        }
    }
}

/// Registry and canonical ledgers, loaded once per run.
struct Inputs {
    ids: IdentityMap,
    ledgers: Vec<LegislatorVoteLedger>,
}

fn load_inputs<S: RecordStore + ?Sized>(store: &S) -> Result<Inputs> {
    let registry = load_registry(store).context("loading legislator registry")?;
    let ids = IdentityMap::from_registry(&registry);
    let ledgers = merge_ledgers(load_ledgers(store).context("loading vote ledgers")?, &ids);
    Ok(Inputs { ids, ledgers })
}

pub fn profile_key(p: &LegislatorProfile) -> RecordKey {
    RecordKey::new()
        .with("member_id", &p.member_id)
        .with("model", &p.model)
        .with("schema_version", p.schema_version)
        .with("spec_hash", &p.spec_hash)
}

/// Classifications for a partition, or `None` when the partition is empty.
fn partition_lookup<S: RecordStore + ?Sized>(store: &S, partition: &Partition) -> Result<Option<ClassificationLookup>> {
    match load_classifications(store, partition) {
        Ok((lookup, _)) => Ok(Some(lookup)),
        Err(IdeologyError::EmptyResultSet { spec_hash }) => {
            warn!("No classifications for partition, nothing to score - spec_hash={}", spec_hash);
            Ok(None)
        }
        Err(e) => Err(e).context("loading bill classifications"),
    }
}

fn score_partition<S: RecordStore + ?Sized>(
    store: &S,
    lookup: &ClassificationLookup,
    inputs: &Inputs,
    partition: &Partition,
    config: &Config,
) -> Result<RunSummary> {
    let spec_hash = partition.spec_hash();

    let raw = build_profiles(&inputs.ledgers, lookup, partition);
    let ranked = rank_profiles(&raw, inputs.ids.current_members(), config.min_bills);

    let persist_start = Instant::now();
    for profile in &ranked {
        upsert_record(store, LEGISLATOR_PROFILES, &profile_key(profile), profile)
            .with_context(|| format!("writing profile {}", profile.member_id))?;
    }
    info!(
        "Profiles persisted - duration={:.2}s, spec_hash={}, count={}",
        persist_start.elapsed().as_secs_f32(),
        spec_hash,
        ranked.len()
    );

    Ok(RunSummary {
        spec_hash,
        bills: lookup.len(),
        legislators: ledger_count(&inputs.ledgers, partition),
        written: ranked.len(),
    })
}

fn ledger_count(ledgers: &[LegislatorVoteLedger], partition: &Partition) -> usize {
    match partition.chamber() {
        Some(ch) => ledgers
            .iter()
            .filter(|l| Chamber::of_member_id(&l.member_id) == ch)
            .count(),
        None => ledgers.len(),
    }
}

/// Score, rank and store every legislator profile for one partition.
pub fn run_profiles<S: RecordStore + ?Sized>(store: &S, partition: &Partition, config: &Config) -> Result<RunOutcome> {
    let run_start = Instant::now();
    let spec_hash = partition.spec_hash();
    info!("Profile run started - spec_hash={}, min_bills={}", spec_hash, config.min_bills);

    let Some(lookup) = partition_lookup(store, partition)? else {
        return Ok(RunOutcome::NoClassifications { spec_hash });
    };
    let inputs = load_inputs(store)?;
    let summary = score_partition(store, &lookup, &inputs, partition, config)?;

    info!(
        "Profile run completed - duration={:.2}s, spec_hash={}, bills={}, profiles={}",
        run_start.elapsed().as_secs_f32(),
        summary.spec_hash,
        summary.bills,
        summary.written
    );
    Ok(RunOutcome::Completed(summary))
}

/// Count stakeholder groups per legislator for one partition.
pub fn run_stakeholders<S: RecordStore + ?Sized>(store: &S, partition: &Partition) -> Result<RunOutcome> {
    let run_start = Instant::now();
    let spec_hash = partition.spec_hash();

    let Some(lookup) = partition_lookup(store, partition)? else {
        return Ok(RunOutcome::NoClassifications { spec_hash });
    };
    let inputs = load_inputs(store)?;

    let frequencies = find_stakeholders(&inputs.ledgers, &lookup, partition);
    for f in &frequencies {
        upsert_record(store, LEGISLATOR_STAKEHOLDERS, &f.key(), f)
            .with_context(|| format!("writing stakeholders for {}", f.member_id))?;
    }

    info!(
        "Stakeholder run completed - duration={:.2}s, spec_hash={}, legislators={}",
        run_start.elapsed().as_secs_f32(),
        spec_hash,
        frequencies.len()
    );
    Ok(RunOutcome::Completed(RunSummary {
        bills: lookup.len(),
        legislators: ledger_count(&inputs.ledgers, partition),
        written: frequencies.len(),
        spec_hash,
    }))
}

fn load_profiles<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<LegislatorProfile>> {
    let docs = store.find(LEGISLATOR_PROFILES).context("loading legislator profiles")?;
    let profiles: Vec<LegislatorProfile> = docs
        .into_iter()
        .filter_map(|d| match serde_json::from_value::<LegislatorProfile>(d) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Stored profile skipped, undecodable - error={}", e);
                None
            }
        })
        .collect();
    Ok(profiles)
}

/// Distinct spec hashes present in the profile collection, sorted.
pub fn find_all_spec_hashes<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    Ok(load_profiles(store)?
        .into_iter()
        .map(|p| p.spec_hash)
        .sorted()
        .dedup()
        .collect())
}

/// Chart statistics for one spec hash, or for every spec hash on record.
/// Returns the number of documents written.
pub fn run_stats<S: RecordStore + ?Sized>(store: &S, spec_hash: Option<&str>, config: &Config) -> Result<usize> {
    let run_start = Instant::now();

    let profiles = load_profiles(store)?;
    let registry = load_registry(store).context("loading legislator registry")?;
    let ids = IdentityMap::from_registry(&registry);

    let hashes: Vec<String> = match spec_hash {
        Some(h) => vec![h.to_string()],
        None => profiles.iter().map(|p| p.spec_hash.clone()).sorted().dedup().collect(),
    };

    let mut written = 0usize;
    for hash in &hashes {
        if !profiles.iter().any(|p| &p.spec_hash == hash) {
            warn!("No stored profiles for spec_hash, skipping stats - spec_hash={}", hash);
            continue;
        }

        let stats = generate_stats(hash, &profiles, ids.current_members(), config.min_bills, config.bin_width);
        for stat in &stats {
            upsert_record(store, AGGREGATED_STATS, &stat.key(), stat)
                .with_context(|| format!("writing {} stats for {}", stat.chart_type(), stat.subject))?;
        }
        written += stats.len();
    }

    info!(
        "Stats run completed - duration={:.2}s, spec_hashes={}, documents={}",
        run_start.elapsed().as_secs_f32(),
        hashes.len(),
        written
    );
    Ok(written)
}

/// Every (model, schema version, chamber) combination present in the store,
/// skipping banned models. Combinations run in parallel.
pub fn run_all_combinations<S: RecordStore + ?Sized>(store: &S, config: &Config) -> Result<Vec<RunOutcome>> {
    let sweep_start = Instant::now();

    let (classifications, report) = load_all_classifications(store).context("loading bill classifications")?;
    let inputs = load_inputs(store)?;

    let combos: BTreeSet<(String, u32)> = classifications
        .iter()
        .filter(|c| config.schema_versions.contains(&c.schema_version))
        .filter(|c| {
            let banned = config.is_banned(&c.model);
            if banned {
                debug!("Banned model skipped - model={}", c.model);
            }
            !banned
        })
        .map(|c| (c.model.clone(), c.schema_version))
        .collect();

    let mut partitions = Vec::new();
    for (model, schema) in &combos {
        for &chamber in &config.chambers {
            let filters = Filters {
                chamber: Some(chamber),
                ..Filters::default()
            };
            partitions.push(Partition::new(model, Some(*schema), filters)?);
        }
    }
    info!(
        "Sweep planned - models={}, partitions={}, quarantined={}",
        combos.iter().map(|(m, _)| m).dedup().count(),
        partitions.len(),
        report.quarantined
    );

    let outcomes = partitions
        .par_iter()
        .map(|partition| {
            let mut partition_report = report;
            let lookup = lookup_for(&classifications, partition, &mut partition_report);
            if lookup.is_empty() {
                return Ok(RunOutcome::NoClassifications { spec_hash: partition.spec_hash() });
            }
            score_partition(store, &lookup, &inputs, partition, config).map(RunOutcome::Completed)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Sweep completed - duration={:.2}s, partitions={}, completed={}",
        sweep_start.elapsed().as_secs_f32(),
        outcomes.len(),
        outcomes.iter().filter(|o| matches!(o, RunOutcome::Completed(_))).count()
    );
    Ok(outcomes)
}
