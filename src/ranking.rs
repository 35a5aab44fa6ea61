use itertools::Itertools;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

use crate::ideology::round3;
use crate::models::{CategoryField, CategoryScore, LegislatorProfile};

/// Sentinel for ranked members outside the current population.
pub const NOT_CURRENT: i64 = -1;

/// 1-based dense rank over ascending value, in input order.
///
/// `[0.5, 0.7, 0.5]` ranks as `[1, 2, 1]`.
pub fn dense_rank(values: &[f64]) -> Vec<u32> {
    let values = unsigned_zeros(values);
    let distinct: Vec<f64> = values
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .dedup_by(|a, b| a.total_cmp(b).is_eq())
        .collect();

    values
        .iter()
        .map(|v| {
            let pos = distinct.partition_point(|d| d.total_cmp(v).is_lt());
            pos as u32 + 1
        })
        .collect()
}

// total_cmp puts -0.0 below 0.0
fn unsigned_zeros(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| if v == 0.0 { 0.0 } else { v }).collect()
}

/// Fractional position in the ascending population, rounded to 3 decimals.
/// Tied values share the average of their 1-based ordinal positions, so the
/// single highest value gets `1.0`.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let values = unsigned_zeros(values);
    let n = values.len();
    let order: Vec<usize> = (0..n).sorted_by(|&a, &b| values[a].total_cmp(&values[b])).collect();
    let mut out = vec![0.0; n];

    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]].total_cmp(&values[order[start]]).is_eq() {
            end += 1;
        }
        // ordinals start+1 ..= end
        let avg = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = round3(avg / n as f64);
        }
        start = end;
    }
    out
}

fn clear_ranks(score: &mut CategoryScore) {
    score.rank = None;
    score.percentile_rank = None;
    score.current_rank = None;
    score.current_percentile_rank = None;
    score.total_members = None;
    score.total_current_members = None;
}

/// Return ranked copies of `profiles`. Scores are never modified; entries
/// below `min_bills` come back with no rank fields.
pub fn rank_profiles(
    profiles: &[LegislatorProfile],
    current_members: &HashSet<String>,
    min_bills: usize,
) -> Vec<LegislatorProfile> {
    let start = Instant::now();
    let mut ranked = profiles.to_vec();

    for profile in &mut ranked {
        for field in CategoryField::ALL {
            profile.categories_mut(field).values_mut().for_each(clear_ranks);
        }
    }

    // (field, category) -> [(profile index, score)]
    let groups = profiles
        .iter()
        .enumerate()
        .flat_map(|(i, p)| {
            CategoryField::ALL.into_iter().flat_map(move |field| {
                p.categories(field)
                    .iter()
                    .filter(move |(_, s)| s.bill_count >= min_bills)
                    .map(move |(name, s)| ((field, name.clone()), (i, s.score)))
            })
        })
        .into_group_map();

    for ((field, category), members) in &groups {
        let scores: Vec<f64> = members.iter().map(|&(_, s)| s).collect();
        let ranks = dense_rank(&scores);
        let pcts = percentile_ranks(&scores);

        let current: Vec<(usize, f64)> = members
            .iter()
            .copied()
            .filter(|&(i, _)| current_members.contains(&profiles[i].member_id))
            .collect();
        let current_scores: Vec<f64> = current.iter().map(|&(_, s)| s).collect();
        let current_ranks = dense_rank(&current_scores);
        let current_pcts = percentile_ranks(&current_scores);

        for (k, &(i, _)) in members.iter().enumerate() {
            if let Some(score) = ranked[i].categories_mut(*field).get_mut(category) {
                score.rank = Some(ranks[k]);
                score.percentile_rank = Some(pcts[k]);
                score.current_rank = Some(NOT_CURRENT);
                score.current_percentile_rank = Some(NOT_CURRENT as f64);
                score.total_members = Some(members.len());
                score.total_current_members = Some(current.len());
            }
        }
        for (k, &(i, _)) in current.iter().enumerate() {
            if let Some(score) = ranked[i].categories_mut(*field).get_mut(category) {
                score.current_rank = Some(i64::from(current_ranks[k]));
                score.current_percentile_rank = Some(current_pcts[k]);
            }
        }

        debug!(
            "Category ranked - field={}, category={}, members={}, current={}",
            field,
            category,
            members.len(),
            current.len()
        );
    }

    info!(
        "Ranking completed - duration={:.2}s, profiles={}, groups={}, min_bills={}",
        start.elapsed().as_secs_f32(),
        profiles.len(),
        groups.len(),
        min_bills
    );
    ranked
}
