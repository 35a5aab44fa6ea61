use once_cell::sync::Lazy;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::models::{
    CategoryRating, CategoryScore, CategoryScores, ClassificationLookup, LegislatorProfile, LegislatorVoteLedger,
};
use crate::spec::{Chamber, Partition};

static YEA: Lazy<HashSet<&'static str>> = Lazy::new(|| ["yea", "yes", "aye", "y"].into_iter().collect());
static NAY: Lazy<HashSet<&'static str>> = Lazy::new(|| ["nay", "no", "n"].into_iter().collect());

/// +1 support, -1 opposition, 0 for anything else (not voting, present, blank).
pub fn vote_direction(vote: &str) -> i8 {
    let v = vote.trim().to_lowercase();
    if YEA.contains(v.as_str()) {
        1
    } else if NAY.contains(v.as_str()) {
        -1
    } else {
        0
    }
}

pub fn weighted_score(rating: &CategoryRating, direction: i8) -> f64 {
    rating.partisan_score * rating.impact_score * f64::from(direction)
}

/// Round to three decimals; never returns negative zero.
pub fn round3(x: f64) -> f64 {
    let r = (x * 1000.0).round() / 1000.0;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Raw aggregation result for one ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ideology {
    pub primary_categories: CategoryScores,
    pub subcategories: CategoryScores,
    /// Votes on classified bills with a yea/nay direction.
    pub vote_count: usize,
}

#[derive(Debug, Default)]
struct Tally {
    sum: f64,
    bills: Vec<String>,
}

type Tallies = BTreeMap<String, Tally>;

fn accumulate(tallies: &mut Tallies, ratings: &[CategoryRating], bill_id: &str, direction: i8) {
    for rating in ratings {
        if rating.partisan_score == 0.0 {
            continue;
        }
        let t = tallies.entry(rating.name.clone()).or_default();
        t.sum += weighted_score(rating, direction);
        t.bills.push(bill_id.to_string());
    }
}

fn finalize(tallies: Tallies) -> CategoryScores {
    tallies
        .into_iter()
        .filter(|(_, t)| !t.bills.is_empty())
        .map(|(name, t)| {
            let score = round3(t.sum / t.bills.len() as f64);
            (name, CategoryScore::unranked(score, t.bills))
        })
        .collect()
}

/// Mean of `partisan_score * impact_score * direction` per category, over
/// cast votes on classified bills. Zero-partisan ratings add no evidence.
pub fn calculate_ideology(ledger: &LegislatorVoteLedger, lookup: &ClassificationLookup) -> Ideology {
    let mut primary = Tallies::new();
    let mut sub = Tallies::new();
    let mut vote_count = 0usize;
    let mut unclassified = 0usize;

    for record in &ledger.votes {
        let bill_id = record.bill.bill_id();

        let Some(classification) = lookup.get(&bill_id) else {
            unclassified += 1;
            continue;
        };

        let direction = vote_direction(&record.vote);
        if direction == 0 {
            continue;
        }

        accumulate(&mut primary, &classification.primary_categories, &bill_id, direction);
        accumulate(&mut sub, &classification.subcategories, &bill_id, direction);
        vote_count += 1;
    }

    debug!(
        "Ledger aggregated - member_id={}, votes={}, counted={}, unclassified={}",
        ledger.member_id,
        ledger.votes.len(),
        vote_count,
        unclassified
    );

    Ideology {
        primary_categories: finalize(primary),
        subcategories: finalize(sub),
        vote_count,
    }
}

pub fn build_profile(
    ledger: &LegislatorVoteLedger,
    lookup: &ClassificationLookup,
    partition: &Partition,
) -> LegislatorProfile {
    let ideology = calculate_ideology(ledger, lookup);
    LegislatorProfile {
        member_id: ledger.member_id.clone(),
        name: ledger.name.clone(),
        party: ledger.party.clone(),
        state: ledger.state.clone(),
        model: partition.model.clone(),
        schema_version: partition.schema_version,
        spec_hash: partition.spec_hash(),
        vote_count: ideology.vote_count,
        primary_categories: ideology.primary_categories,
        subcategories: ideology.subcategories,
        last_modified: None,
    }
}

/// Profiles for every ledger in the partition's chamber that cast at least
/// one counted vote, sorted by `member_id`.
pub fn build_profiles(
    ledgers: &[LegislatorVoteLedger],
    lookup: &ClassificationLookup,
    partition: &Partition,
) -> Vec<LegislatorProfile> {
    let start = std::time::Instant::now();
    let spec_hash = partition.spec_hash();
    let chamber = partition.chamber();

    let mut profiles: Vec<LegislatorProfile> = ledgers
        .par_iter()
        .filter(|l| chamber.map_or(true, |ch| Chamber::of_member_id(&l.member_id) == ch))
        .map(|l| build_profile(l, lookup, partition))
        .filter(|p| p.vote_count > 0)
        .collect();
    profiles.sort_by(|a, b| a.member_id.cmp(&b.member_id));

    info!(
        "Profiles built - spec_hash={}, ledgers={}, profiles={}, duration={:.2}s",
        spec_hash,
        ledgers.len(),
        profiles.len(),
        start.elapsed().as_secs_f32()
    );
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillClassification, BillRef, StakeholderSupport, VoteRecord};
    use crate::spec::Filters;

    fn rating(name: &str, partisan: f64, impact: f64) -> CategoryRating {
        CategoryRating { name: name.into(), partisan_score: partisan, impact_score: impact }
    }

    fn classified(number: u32, primary: Vec<CategoryRating>, sub: Vec<CategoryRating>) -> BillClassification {
        BillClassification {
            bill_id: format!("hr{}-119", number),
            model: "m1".into(),
            schema_version: 3,
            congress: Some(119),
            chamber: Some("house".into()),
            bill_type: Some("hr".into()),
            primary_categories: primary,
            subcategories: sub,
            stakeholders: StakeholderSupport::default(),
        }
    }

    fn lookup(bills: Vec<BillClassification>) -> ClassificationLookup {
        bills.into_iter().map(|b| (b.bill_id.clone(), b)).collect()
    }

    fn ledger(member_id: &str, votes: &[(u32, &str)]) -> LegislatorVoteLedger {
        LegislatorVoteLedger {
            member_id: member_id.into(),
            name: "Rep. A".into(),
            party: "D".into(),
            state: "CA".into(),
            votes: votes
                .iter()
                .map(|&(number, vote)| VoteRecord {
                    vote_id: None,
                    bill: BillRef { congress: 119, number, bill_type: "hr".into() },
                    vote: vote.into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_vote_direction_vocabulary() {
        for v in ["Yea", "yes", " AYE ", "y"] {
            assert_eq!(vote_direction(v), 1, "{}", v);
        }
        for v in ["Nay", "NO", "n"] {
            assert_eq!(vote_direction(v), -1, "{}", v);
        }
        for v in ["Not Voting", "Present", "", "maybe"] {
            assert_eq!(vote_direction(v), 0, "{}", v);
        }
    }

    #[test]
    fn test_yea_and_nay_average() {
        // yea on X: 0.8 × 0.5 × +1 = 0.4, nay on Y: -0.6 × 1.0 × -1 = 0.6
        let bills = lookup(vec![
            classified(1, vec![rating("Economic Policy", 0.8, 0.5)], vec![]),
            classified(2, vec![rating("Economic Policy", -0.6, 1.0)], vec![]),
        ]);
        let result = calculate_ideology(&ledger("A", &[(1, "Yea"), (2, "Nay")]), &bills);

        let econ = &result.primary_categories["Economic Policy"];
        assert_eq!(econ.score, 0.5);
        assert_eq!(econ.bill_count, 2);
        assert_eq!(econ.bills, vec!["hr1-119", "hr2-119"]);
        assert_eq!(result.vote_count, 2);
    }

    #[test]
    fn test_zero_partisan_votes_do_not_dilute() {
        let bills = lookup(vec![
            classified(1, vec![rating("Healthcare", 0.6, 1.0)], vec![]),
            classified(2, vec![rating("Healthcare", 0.0, 1.0)], vec![]),
            classified(3, vec![rating("Healthcare", 0.0, 0.9)], vec![]),
        ]);
        let result = calculate_ideology(&ledger("A", &[(1, "Yea"), (2, "Yea"), (3, "Nay")]), &bills);

        let health = &result.primary_categories["Healthcare"];
        assert_eq!(health.score, 0.6);
        assert_eq!(health.bills, vec!["hr1-119"]);
        assert!(!health.bills.contains(&"hr2-119".to_string()));
        assert!(!health.bills.contains(&"hr3-119".to_string()));
    }

    #[test]
    fn test_neutral_only_category_has_no_entry() {
        let bills = lookup(vec![
            classified(1, vec![rating("Defense", 0.0, 1.0)], vec![rating("Veterans", 0.0, 0.4)]),
            classified(2, vec![rating("Defense", 0.0, 0.7)], vec![]),
        ]);
        let result = calculate_ideology(&ledger("A", &[(1, "Yea"), (2, "Nay")]), &bills);

        assert!(!result.primary_categories.contains_key("Defense"));
        assert!(!result.subcategories.contains_key("Veterans"));
        // The votes still count toward participation
        assert_eq!(result.vote_count, 2);
    }

    #[test]
    fn test_unclassified_and_abstentions_skipped() {
        let bills = lookup(vec![classified(1, vec![rating("Immigration", -0.5, 0.5)], vec![])]);
        let result = calculate_ideology(
            &ledger("A", &[(1, "Not Voting"), (7, "Yea"), (1, "Present"), (1, "Nay")]),
            &bills,
        );

        assert_eq!(result.vote_count, 1);
        assert_eq!(result.primary_categories["Immigration"].score, 0.25);
        assert_eq!(result.primary_categories["Immigration"].bill_count, 1);
    }

    #[test]
    fn test_subcategories_scored_independently() {
        let bills = lookup(vec![classified(
            1,
            vec![rating("Economic Policy", 0.5, 1.0)],
            vec![rating("Tax Policy", -0.9, 0.5), rating("Trade", 0.3, 0.3)],
        )]);
        let result = calculate_ideology(&ledger("A", &[(1, "Yea")]), &bills);

        assert_eq!(result.subcategories["Tax Policy"].score, -0.45);
        assert_eq!(result.subcategories["Trade"].score, 0.09);
        assert!(!result.primary_categories.contains_key("Tax Policy"));
    }

    #[test]
    fn test_scores_stay_in_range() {
        let grid = [-1.0, -0.7, -0.25, 0.0, 0.3, 0.85, 1.0];
        let impacts = [0.0, 0.1, 0.5, 1.0];
        let mut bills = Vec::new();
        let mut votes = Vec::new();
        let mut n = 0u32;
        for &p in &grid {
            for &i in &impacts {
                n += 1;
                bills.push(classified(n, vec![rating("Mixed", p, i)], vec![]));
                votes.push((n, if n % 2 == 0 { "Yea" } else { "Nay" }));
            }
        }
        let result = calculate_ideology(&ledger("A", &votes), &lookup(bills));
        for score in result.primary_categories.values() {
            assert!((-1.0..=1.0).contains(&score.score));
        }
    }

    #[test]
    fn test_rerun_is_identical() {
        let bills = lookup(vec![
            classified(1, vec![rating("Economic Policy", 0.8, 0.5)], vec![rating("Tax Policy", 0.2, 0.2)]),
            classified(2, vec![rating("Economic Policy", -0.6, 1.0)], vec![]),
        ]);
        let partition = Partition::new("m1", Some(3), Filters::default()).unwrap();
        let ledgers = vec![ledger("A000001", &[(1, "Yea"), (2, "Nay")]), ledger("B000002", &[(2, "Yea")])];

        let first = build_profiles(&ledgers, &bills, &partition);
        let second = build_profiles(&ledgers, &bills, &partition);
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_profiles_filters_chamber_and_idle_members() {
        let bills = lookup(vec![classified(1, vec![rating("Economic Policy", 0.8, 0.5)], vec![])]);
        let filters = Filters::parse(None, Some("senate"), &[] as &[&str]).unwrap();
        let partition = Partition::new("m1", Some(3), filters).unwrap();
        let ledgers = vec![
            ledger("A000001", &[(1, "Yea")]), // house member
            ledger("S313", &[(1, "Nay")]),
            ledger("S200", &[(1, "Not Voting")]), // no counted votes
        ];

        let profiles = build_profiles(&ledgers, &bills, &partition);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].member_id, "S313");
        assert_eq!(profiles[0].spec_hash, "m1_3_all_senate_all");
        assert_eq!(profiles[0].primary_categories["Economic Policy"].score, -0.4);
    }
}
