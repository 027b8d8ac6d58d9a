//! Cluster building from accepted pairs.
//!
//! Two policies are available:
//!
//! - [`ClusteringPolicy::Star`]: records are visited by descending
//!   frequency; each unvisited record anchors a new cluster and absorbs
//!   every unvisited record that auto-merges with *the anchor*. If A~B and
//!   B~C but not A~C, A and C can land in different clusters depending on
//!   processing order. Favors precision. Not monotone in
//!   `high_confidence_cutoff`: dropping an anchor's link can free the
//!   record to anchor its own cluster, so a stricter cutoff may merge more.
//! - [`ClusteringPolicy::Transitive`]: connected components over all
//!   auto-merge edges in a block. Chains of near-duplicates collapse into
//!   one cluster. Favors recall, and can over-merge through a single weak
//!   link. Without role tags, raising the cutoff only removes edges, so it
//!   never increases merges.
//!
//! Both run independently per block, so blocks can be sharded across
//! threads and concatenated afterwards.

use std::cmp::Ordering;

use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::blocking::Block;
use crate::decision::{Decider, Decision};
use crate::record::Record;
use crate::similarity::{MatchMethod, PairScore};

/// How accepted pairs become clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringPolicy {
    /// Anchor-only clusters
    #[default]
    Star,
    /// Full equivalence closure within a block
    Transitive,
}

/// A clustered record and the link that attached it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member {
    /// Index into the record slice
    pub index: usize,
    /// Anchors carry an exact self-link
    pub link: PairScore,
}

/// Records judged to denote one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Anchor first, then members by descending frequency
    pub members: Vec<Member>,
    /// First non-empty role tag among the members; no member carries a
    /// different one
    pub role_tag: Option<String>,
}

impl Cluster {
    pub fn anchor(&self) -> usize {
        self.members[0].index
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Sum of member frequencies
    pub fn total_frequency(&self, records: &[Record]) -> u64 {
        self.members.iter().map(|m| records[m.index].frequency).sum()
    }
}

/// A review-band pair: plausible, flagged, never merged
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewPair {
    pub a: usize,
    pub b: usize,
    pub score: PairScore,
}

/// Everything the cluster stage produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    pub review: Vec<ReviewPair>,
    /// Pairs passed to the decider
    pub comparisons: usize,
    /// Pairs whose scoring failed and were skipped
    pub skipped_pairs: usize,
}

impl Clustering {
    fn absorb(&mut self, other: Clustering) {
        self.clusters.extend(other.clusters);
        self.review.extend(other.review);
        self.comparisons += other.comparisons;
        self.skipped_pairs += other.skipped_pairs;
    }

    /// Records merged away (members beyond each anchor)
    pub fn merges(&self) -> usize {
        self.clusters.iter().map(|c| c.len() - 1).sum()
    }
}

const ANCHOR_LINK: PairScore = PairScore {
    value: 1.0,
    method: MatchMethod::Exact,
};

/// Two role tags may share a cluster unless both are set and differ
fn roles_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Processing order: descending frequency, then raw text
fn by_frequency(records: &[Record]) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |&a, &b| {
        records[b]
            .frequency
            .cmp(&records[a].frequency)
            .then_with(|| records[a].raw_text.cmp(&records[b].raw_text))
            .then_with(|| records[a].role_tag.cmp(&records[b].role_tag))
    }
}

/// Cluster every block and concatenate the results in block order
pub fn build_clusters(
    records: &[Record],
    blocks: &[Block],
    decider: &Decider<'_>,
    policy: ClusteringPolicy,
    parallel: bool,
) -> Clustering {
    let run = |block: &Block| match policy {
        ClusteringPolicy::Star => star_block(records, block, decider),
        ClusteringPolicy::Transitive => transitive_block(records, block, decider),
    };

    let outcomes: Vec<Clustering> = if parallel {
        blocks.par_iter().map(run).collect()
    } else {
        blocks.iter().map(run).collect()
    };

    outcomes
        .into_iter()
        .fold(Clustering::default(), |mut acc, outcome| {
            acc.absorb(outcome);
            acc
        })
}

/// Decide one pair, logging and counting scoring failures
fn judge(
    records: &[Record],
    decider: &Decider<'_>,
    a: usize,
    b: usize,
    out: &mut Clustering,
) -> Option<(Decision, PairScore)> {
    out.comparisons += 1;
    match decider.decide(&records[a], &records[b]) {
        Ok(verdict) => verdict.score.map(|s| (verdict.decision, s)),
        Err(err) => {
            warn!(
                a = %records[a].raw_text,
                b = %records[b].raw_text,
                error = %err,
                "skipping pair"
            );
            out.skipped_pairs += 1;
            None
        }
    }
}

fn star_block(records: &[Record], block: &Block, decider: &Decider<'_>) -> Clustering {
    let mut out = Clustering::default();
    let mut order = block.members.clone();
    order.sort_by(by_frequency(records));
    // unvisited (None) -> assigned to a cluster; never reassigned
    let mut assigned: Vec<Option<usize>> = vec![None; order.len()];

    for pos in 0..order.len() {
        if assigned[pos].is_some() {
            continue;
        }
        let cluster_id = out.clusters.len();
        assigned[pos] = Some(cluster_id);
        let anchor = order[pos];
        let mut role_tag = records[anchor].role_tag.clone();
        let mut members = vec![Member {
            index: anchor,
            link: ANCHOR_LINK,
        }];

        for cand_pos in pos + 1..order.len() {
            if assigned[cand_pos].is_some() {
                continue;
            }
            let candidate = order[cand_pos];
            let candidate_role = records[candidate].role_tag.as_deref();
            if !roles_compatible(role_tag.as_deref(), candidate_role) {
                continue;
            }
            match judge(records, decider, anchor, candidate, &mut out) {
                Some((Decision::AutoMerge, score)) => {
                    assigned[cand_pos] = Some(cluster_id);
                    if role_tag.is_none() {
                        role_tag = records[candidate].role_tag.clone();
                    }
                    members.push(Member {
                        index: candidate,
                        link: score,
                    });
                }
                Some((Decision::Review, score)) => out.review.push(ReviewPair {
                    a: anchor,
                    b: candidate,
                    score,
                }),
                _ => {}
            }
        }

        out.clusters.push(Cluster { members, role_tag });
    }

    out
}

fn transitive_block(records: &[Record], block: &Block, decider: &Decider<'_>) -> Clustering {
    let mut out = Clustering::default();
    let mut order = block.members.clone();
    order.sort_by(by_frequency(records));
    let n = order.len();

    let mut components = UnionFind::<usize>::new(n);
    // Role of each component, stored at its current root
    let mut roles: Vec<Option<&str>> = order
        .iter()
        .map(|&idx| records[idx].role_tag.as_deref())
        .collect();
    let mut best_link: Vec<Option<PairScore>> = vec![None; n];
    let mut review = Vec::new();

    for i in 0..n {
        for j in i + 1..n {
            match judge(records, decider, order[i], order[j], &mut out) {
                Some((Decision::AutoMerge, score)) => {
                    let (ri, rj) = (components.find_mut(i), components.find_mut(j));
                    if ri != rj {
                        if !roles_compatible(roles[ri], roles[rj]) {
                            continue;
                        }
                        let merged = roles[ri].or(roles[rj]);
                        components.union(i, j);
                        let root = components.find_mut(i);
                        roles[root] = merged;
                    }
                    for k in [i, j] {
                        if best_link[k].map_or(true, |l| score.value > l.value) {
                            best_link[k] = Some(score);
                        }
                    }
                }
                Some((Decision::Review, score)) => review.push((i, j, score)),
                _ => {}
            }
        }
    }

    let labels = components.into_labeling();
    // `order` is sorted, so the first position seen for a label is its anchor.
    let mut cluster_of_label: Vec<Option<usize>> = vec![None; n];
    for pos in 0..n {
        let label = labels[pos];
        let cluster_id = match cluster_of_label[label] {
            Some(id) => id,
            None => {
                let id = out.clusters.len();
                cluster_of_label[label] = Some(id);
                out.clusters.push(Cluster {
                    members: Vec::new(),
                    role_tag: None,
                });
                id
            }
        };
        let cluster = &mut out.clusters[cluster_id];
        if cluster.role_tag.is_none() {
            cluster.role_tag = records[order[pos]].role_tag.clone();
        }
        let members = &mut cluster.members;
        let link = if members.is_empty() {
            ANCHOR_LINK
        } else {
            best_link[pos].unwrap_or(ANCHOR_LINK)
        };
        members.push(Member {
            index: order[pos],
            link,
        });
    }

    out.review.extend(
        review
            .into_iter()
            .filter(|(i, j, _)| labels[*i] != labels[*j])
            .map(|(i, j, score)| ReviewPair {
                a: order[i],
                b: order[j],
                score,
            }),
    );

    out
}
