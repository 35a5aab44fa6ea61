use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, info};

use crate::ideology::round3;
use crate::models::{CategoryField, LegislatorProfile};
use crate::store::RecordKey;

pub const DEFAULT_BIN_WIDTH: f64 = 0.05;
pub const MAX_BINS: usize = 2000;

/// Parties that always get a column, even when empty.
const CORE_PARTIES: [&str; 3] = ["D", "R", "I"];

/* -------------------------------------------------------------------------- */
/* Documents                                                                  */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStat {
    pub spec_hash: String,
    pub field: CategoryField,
    pub subject: String, // category name
    pub current: bool,   // restricted to currently serving members
    #[serde(flatten)]
    pub chart: Chart,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl AggregatedStat {
    pub fn chart_type(&self) -> &'static str {
        match self.chart {
            Chart::Histogram(_) => "histogram",
            Chart::Scatter(_) => "scatter",
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new()
            .with("spec_hash", &self.spec_hash)
            .with("field", self.field)
            .with("subject", &self.subject)
            .with("chart_type", self.chart_type())
            .with("current", self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chart_type", rename_all = "lowercase")]
pub enum Chart {
    Histogram(HistogramChart),
    Scatter(ScatterChart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramChart {
    pub bin_width: f64,
    pub bins: Vec<Bin>,
    pub party_stats: BTreeMap<String, PartyStats>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub range: String, // "-1.00 to -0.95"
    pub start: f64,
    pub end: f64,
    #[serde(flatten)]
    pub counts: BTreeMap<String, usize>, // party -> legislators
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>, // population
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterChart {
    pub points: Vec<ScatterPoint>,
    pub correlation: f64,
    pub score_range: [f64; 2],
    pub bill_count_range: [usize; 2],
    pub party_counts: BTreeMap<String, usize>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub member_id: String,
    pub name: String,
    pub party: String,
    pub state: String,
    pub score: f64,
    pub bill_count: usize,
}

/* -------------------------------------------------------------------------- */
/* Math helpers                                                               */
/* -------------------------------------------------------------------------- */

/// Blank party codes count as independent.
pub fn party_key(party: &str) -> String {
    let p = party.trim();
    if p.is_empty() {
        "I".to_string()
    } else {
        p.to_uppercase()
    }
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation.
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    Some(var.sqrt())
}

/// Pearson correlation; 0.0 when undefined (fewer than two points or a
/// constant axis).
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let (Some(mx), Some(my)) = (mean(xs), mean(ys)) else {
        return 0.0;
    };

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

fn party_stats(scores: &[f64]) -> PartyStats {
    PartyStats {
        mean: mean(scores).map(round3),
        median: median(scores).map(round3),
        min: scores.iter().copied().reduce(f64::min),
        max: scores.iter().copied().reduce(f64::max),
        std: std_dev(scores).map(round3),
        count: scores.len(),
    }
}

/* -------------------------------------------------------------------------- */
/* 1) Histogram                                                               */
/* -------------------------------------------------------------------------- */

/// Bin index for `score` over `[-1, 1]`; the last bin is closed so 1.0 lands.
fn bin_index(score: f64, width: f64, n_bins: usize) -> usize {
    let raw = ((score + 1.0) / width + 1e-9).floor();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(n_bins - 1)
    }
}

fn empty_counts() -> BTreeMap<String, usize> {
    CORE_PARTIES.iter().map(|p| (p.to_string(), 0)).collect()
}

/// Number of bins a width cuts `[-1, 1]` into, if it divides the range evenly
/// into at most `MAX_BINS` bins.
pub fn bin_count(bin_width: f64) -> Option<usize> {
    if !(bin_width > 0.0 && bin_width <= 2.0) {
        return None;
    }
    let n = 2.0 / bin_width;
    if n.round() > MAX_BINS as f64 || (n - n.round()).abs() > 1e-6 {
        return None;
    }
    Some(n.round() as usize)
}

pub fn build_histogram(points: &[ScatterPoint], bin_width: f64) -> HistogramChart {
    let n_bins = ((2.0 / bin_width).round() as usize).clamp(1, MAX_BINS);
    let width = 2.0 / n_bins as f64;

    let mut bins: Vec<Bin> = (0..n_bins)
        .map(|k| {
            let start = round3(-1.0 + k as f64 * width);
            let end = round3(-1.0 + (k + 1) as f64 * width);
            Bin {
                range: format!("{:.2} to {:.2}", start, end),
                start,
                end,
                counts: empty_counts(),
            }
        })
        .collect();

    let mut by_party: BTreeMap<String, Vec<f64>> = CORE_PARTIES.iter().map(|p| (p.to_string(), Vec::new())).collect();

    for p in points {
        let party = party_key(&p.party);
        let bin = &mut bins[bin_index(p.score, width, n_bins)];
        *bin.counts.entry(party.clone()).or_insert(0) += 1;
        by_party.entry(party).or_default().push(p.score);
    }

    HistogramChart {
        bin_width: width,
        bins,
        party_stats: by_party.iter().map(|(party, scores)| (party.clone(), party_stats(scores))).collect(),
        total_count: points.len(),
    }
}

/* -------------------------------------------------------------------------- */
/* 2) Scatter                                                                 */
/* -------------------------------------------------------------------------- */

pub fn build_scatter(points: Vec<ScatterPoint>) -> ScatterChart {
    let scores: Vec<f64> = points.iter().map(|p| p.score).collect();
    let counts: Vec<f64> = points.iter().map(|p| p.bill_count as f64).collect();

    let mut party_counts = empty_counts();
    for p in &points {
        *party_counts.entry(party_key(&p.party)).or_insert(0) += 1;
    }

    let score_range = [
        scores.iter().copied().reduce(f64::min).unwrap_or(0.0),
        scores.iter().copied().reduce(f64::max).unwrap_or(0.0),
    ];
    let bill_count_range = [
        points.iter().map(|p| p.bill_count).min().unwrap_or(0),
        points.iter().map(|p| p.bill_count).max().unwrap_or(0),
    ];

    ScatterChart {
        correlation: round3(pearson(&scores, &counts)),
        score_range,
        bill_count_range,
        party_counts,
        total_count: points.len(),
        points,
    }
}

/* -------------------------------------------------------------------------- */
/* Entry point                                                                */
/* -------------------------------------------------------------------------- */

fn qualifying_points(
    profiles: &[&LegislatorProfile],
    field: CategoryField,
    category: &str,
    min_bills: usize,
) -> Vec<ScatterPoint> {
    profiles
        .iter()
        .filter_map(|p| {
            let s = p.categories(field).get(category)?;
            (s.bill_count >= min_bills).then(|| ScatterPoint {
                member_id: p.member_id.clone(),
                name: p.name.clone(),
                party: party_key(&p.party),
                state: p.state.clone(),
                score: s.score,
                bill_count: s.bill_count,
            })
        })
        .collect()
}

/// Histogram and scatter for every category with at least one qualifying
/// legislator in `profiles`.
pub fn generate_charts(
    spec_hash: &str,
    profiles: &[&LegislatorProfile],
    current: bool,
    min_bills: usize,
    bin_width: f64,
) -> Vec<AggregatedStat> {
    let mut out = Vec::new();

    for field in CategoryField::ALL {
        let categories: BTreeSet<&String> = profiles.iter().flat_map(|p| p.categories(field).keys()).collect();

        for category in categories {
            let points = qualifying_points(profiles, field, category, min_bills);
            if points.is_empty() {
                debug!(
                    "No qualifying legislators, chart skipped - field={}, category={}, current={}",
                    field, category, current
                );
                continue;
            }

            let stat = |chart| AggregatedStat {
                spec_hash: spec_hash.to_string(),
                field,
                subject: category.clone(),
                current,
                chart,
                last_modified: None,
            };
            out.push(stat(Chart::Histogram(build_histogram(&points, bin_width))));
            out.push(stat(Chart::Scatter(build_scatter(points))));
        }
    }
    out
}

/// Both passes for one spec hash: every profile (`current = false`) and the
/// currently serving subset (`current = true`).
pub fn generate_stats(
    spec_hash: &str,
    profiles: &[LegislatorProfile],
    current_members: &HashSet<String>,
    min_bills: usize,
    bin_width: f64,
) -> Vec<AggregatedStat> {
    let start = Instant::now();

    let all: Vec<&LegislatorProfile> = profiles.iter().filter(|p| p.spec_hash == spec_hash).collect();
    let current: Vec<&LegislatorProfile> =
        all.iter().copied().filter(|p| current_members.contains(&p.member_id)).collect();

    let mut stats = generate_charts(spec_hash, &all, false, min_bills, bin_width);
    stats.extend(generate_charts(spec_hash, &current, true, min_bills, bin_width));

    info!(
        "Stats generated - duration={:.2}s, spec_hash={}, profiles={}, current={}, documents={}",
        start.elapsed().as_secs_f32(),
        spec_hash,
        all.len(),
        current.len(),
        stats.len()
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryScore, CategoryScores};

    fn point(member_id: &str, party: &str, score: f64, bill_count: usize) -> ScatterPoint {
        ScatterPoint {
            member_id: member_id.into(),
            name: member_id.into(),
            party: party.into(),
            state: "OH".into(),
            score,
            bill_count,
        }
    }

    fn profile(member_id: &str, party: &str, scores: &[(&str, f64, usize)]) -> LegislatorProfile {
        let primary: CategoryScores = scores
            .iter()
            .map(|&(name, score, n)| {
                let bills = (1..=n).map(|b| format!("hr{}-119", b)).collect();
                (name.to_string(), CategoryScore::unranked(score, bills))
            })
            .collect();
        LegislatorProfile {
            member_id: member_id.into(),
            name: member_id.into(),
            party: party.into(),
            state: "OH".into(),
            model: "m1".into(),
            schema_version: 3,
            spec_hash: "m1_3_all_all_all".into(),
            vote_count: 30,
            primary_categories: primary,
            subcategories: CategoryScores::new(),
            last_modified: None,
        }
    }

    #[test]
    fn test_bin_count() {
        assert_eq!(bin_count(0.05), Some(40));
        assert_eq!(bin_count(0.1), Some(20));
        assert_eq!(bin_count(2.0), Some(1));
        assert_eq!(bin_count(0.001), Some(2000));
        assert_eq!(bin_count(0.3), None);
        assert_eq!(bin_count(1e-12), None);
        assert_eq!(bin_count(0.0), None);
        assert_eq!(bin_count(f64::NAN), None);
    }

    #[test]
    fn test_histogram_bin_count_is_capped() {
        let hist = build_histogram(&[point("A", "D", 0.2, 10)], 1e-12);
        assert_eq!(hist.bins.len(), MAX_BINS);
        assert_eq!(hist.total_count, 1);
    }

    #[test]
    fn test_median_and_std() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
    }

    #[test]
    fn test_pearson_degenerate_cases() {
        assert_eq!(pearson(&[0.5], &[10.0]), 0.0);
        assert_eq!(pearson(&[0.1, 0.2, 0.3], &[10.0, 10.0, 10.0]), 0.0);
        assert!((pearson(&[0.1, 0.2, 0.3], &[10.0, 20.0, 30.0]) - 1.0).abs() < 1e-9);
        assert!((pearson(&[0.1, 0.2, 0.3], &[30.0, 20.0, 10.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_counts_sum_to_population() {
        let points = vec![
            point("A", "D", -1.0, 10),
            point("B", "R", 1.0, 12),
            point("C", "D", 0.0, 11),
            point("D", "", -0.95, 20),
            point("E", "L", 0.37, 14),
        ];
        let hist = build_histogram(&points, DEFAULT_BIN_WIDTH);

        assert_eq!(hist.bins.len(), 40);
        assert_eq!(hist.bins[0].range, "-1.00 to -0.95");
        assert_eq!(hist.total_count, 5);

        let summed: usize = hist.bins.iter().flat_map(|b| b.counts.values()).sum();
        assert_eq!(summed, points.len());

        // Upper edge lands in the last bin, -0.95 starts the second
        assert_eq!(hist.bins[39].counts["R"], 1);
        assert_eq!(hist.bins[1].counts["I"], 1);
        assert_eq!(hist.bins[20].counts["D"], 1);
        assert_eq!(hist.party_stats["L"].count, 1);
    }

    #[test]
    fn test_empty_party_has_null_stats() {
        let hist = build_histogram(&[point("A", "D", 0.2, 10), point("B", "D", 0.4, 10)], DEFAULT_BIN_WIDTH);

        let d = &hist.party_stats["D"];
        assert_eq!(d.count, 2);
        assert_eq!(d.mean, Some(0.3));
        assert_eq!(d.std, Some(0.1));

        let r = &hist.party_stats["R"];
        assert_eq!(r.count, 0);
        assert!(r.mean.is_none() && r.median.is_none() && r.min.is_none() && r.max.is_none() && r.std.is_none());
    }

    #[test]
    fn test_scatter_summary() {
        let chart = build_scatter(vec![
            point("A", "D", -0.4, 10),
            point("B", "R", 0.6, 30),
            point("C", "R", 0.1, 20),
        ]);
        assert_eq!(chart.score_range, [-0.4, 0.6]);
        assert_eq!(chart.bill_count_range, [10, 30]);
        assert_eq!(chart.party_counts["R"], 2);
        assert_eq!(chart.party_counts["I"], 0);
        assert_eq!(chart.correlation, 1.0);
        assert_eq!(chart.total_count, 3);
    }

    #[test]
    fn test_generate_stats_two_passes_and_threshold() {
        let profiles = vec![
            profile("A", "D", &[("Healthcare", -0.5, 12), ("Defense", 0.1, 2)]),
            profile("B", "R", &[("Healthcare", 0.7, 15), ("Defense", 0.3, 4)]),
        ];
        let current: HashSet<String> = ["A".to_string()].into_iter().collect();
        let stats = generate_stats("m1_3_all_all_all", &profiles, &current, 10, DEFAULT_BIN_WIDTH);

        // Defense has no one over the threshold
        assert!(stats.iter().all(|s| s.subject == "Healthcare"));
        assert_eq!(stats.len(), 4);

        let current_hist = stats
            .iter()
            .find(|s| s.current && s.chart_type() == "histogram")
            .unwrap();
        match &current_hist.chart {
            Chart::Histogram(h) => assert_eq!(h.total_count, 1),
            other => panic!("expected histogram, got {:?}", other),
        }
    }

    #[test]
    fn test_stat_keys_distinct_and_serialized_tag() {
        let profiles = vec![profile("A", "D", &[("Healthcare", -0.5, 12)])];
        let current: HashSet<String> = ["A".to_string()].into_iter().collect();
        let stats = generate_stats("m1_3_all_all_all", &profiles, &current, 10, DEFAULT_BIN_WIDTH);

        let keys: HashSet<String> = stats.iter().map(|s| s.key().digest()).collect();
        assert_eq!(keys.len(), stats.len());

        let json = serde_json::to_value(&stats[0]).unwrap();
        assert_eq!(json["chart_type"], "histogram");
        assert_eq!(json["field"], "primary_categories");
        assert_eq!(json["current"], false);
        assert_eq!(json["bins"][0]["D"], 0);
    }
}
