//! Resolution pipeline
//!
//! `ingest -> partition -> decide -> cluster -> select`, repeated over the
//! canonical forms of the previous pass until a pass merges nothing. The
//! last pass therefore runs over `canonicalize(X)` and changes nothing,
//! which makes canonicalization idempotent.
//!
//! Every ingested record keeps a trace through the passes: the final
//! canonical it ended on, the weakest link score along the way and the
//! method of that link.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::blocking::{comparison_cost, partition};
use crate::canonical::select;
use crate::cluster::{build_clusters, Cluster, ReviewPair};
use crate::config::ResolverConfig;
use crate::decision::Decider;
use crate::error::Result;
use crate::orthography::Recaser;
use crate::record::{ingest, RawEntry, Record};
use crate::report::{ClusterSummary, FlaggedPair, MappingRow, Report, ResolutionStats};
use crate::similarity::{MatchMethod, PairScore};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Trace {
    /// Index into the current pass's records
    current: usize,
    score: f64,
    /// `None` while the record is its own canonical
    method: Option<MatchMethod>,
}

impl Trace {
    fn follow(&mut self, link: PairScore) {
        if self.method.is_none() || link.value < self.score {
            self.score = link.value;
            self.method = Some(link.method);
        }
    }
}

/// One pass's clusters collapsed into their canonical records
struct Collapsed {
    records: Vec<Record>,
    /// Old record index -> new record index
    remap: Vec<usize>,
    /// Link from each merged record to its canonical
    links: Vec<Option<PairScore>>,
}

struct Resolution {
    originals: Vec<Record>,
    finals: Vec<Record>,
    traces: Vec<Trace>,
    /// Indices into `finals`
    review: Vec<ReviewPair>,
    stats: ResolutionStats,
}

/// Identity resolution engine for one configuration
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver, rejecting an invalid configuration
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a batch of entries into a canonical mapping report
    pub fn resolve<I>(&self, entries: I) -> Report
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let resolution = self.run(entries);
        build_report(resolution)
    }

    /// Replace every entry by its canonical form, summing frequencies.
    ///
    /// The output is sorted by text and role and is a fixed point:
    /// canonicalizing it again returns it unchanged.
    pub fn canonicalize<I>(&self, entries: I) -> Vec<RawEntry>
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let mut out: Vec<RawEntry> = self
            .run(entries)
            .finals
            .into_iter()
            .map(|r| RawEntry {
                text: Some(r.raw_text),
                frequency: Some(r.frequency.to_string()),
                role: r.role_tag,
                source_id: Some(r.source_id),
            })
            .collect();
        out.sort_by(|a, b| (&a.text, &a.role).cmp(&(&b.text, &b.role)));
        out
    }

    fn run<I>(&self, entries: I) -> Resolution
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let ingested = ingest(entries);
        let mut stats = ResolutionStats {
            raw_rows: ingested.raw_rows,
            records: ingested.records.len(),
            skipped: ingested.skipped,
            ..Default::default()
        };
        info!(
            raw_rows = stats.raw_rows,
            records = stats.records,
            skipped = stats.skipped,
            "ingested input"
        );

        let originals = ingested.records;
        let mut records = originals.clone();
        let mut traces: Vec<Trace> = (0..records.len())
            .map(|current| Trace {
                current,
                score: 1.0,
                method: None,
            })
            .collect();

        let decider = Decider::new(&self.config);
        let strategy = self.config.blocking_strategy();
        let mut review = Vec::new();
        let mut converged = records.is_empty();

        while !converged && stats.passes < self.config.max_passes {
            stats.passes += 1;
            let blocks = partition(&records, strategy);
            if stats.passes == 1 {
                stats.blocks = blocks.len();
                info!(
                    blocks = blocks.len(),
                    largest = blocks.iter().map(|b| b.members.len()).max().unwrap_or(0),
                    comparisons = comparison_cost(&blocks),
                    "partitioned records"
                );
            }

            let clustering = build_clusters(
                &records,
                &blocks,
                &decider,
                self.config.clustering_policy,
                self.config.parallel,
            );
            stats.comparisons += clustering.comparisons;
            stats.skipped_pairs += clustering.skipped_pairs;
            let merges = clustering.merges();
            stats.merges += merges;
            debug!(
                pass = stats.passes,
                clusters = clustering.clusters.len(),
                merges,
                "pass complete"
            );

            if merges == 0 {
                review = clustering.review;
                converged = true;
                break;
            }

            let collapsed = self.collapse(&records, &clustering.clusters, &decider);
            for trace in &mut traces {
                if let Some(link) = collapsed.links[trace.current] {
                    trace.follow(link);
                }
                trace.current = collapsed.remap[trace.current];
            }
            review = clustering
                .review
                .iter()
                .filter_map(|p| {
                    let (a, b) = (collapsed.remap[p.a], collapsed.remap[p.b]);
                    (a != b).then_some(ReviewPair {
                        a,
                        b,
                        score: p.score,
                    })
                })
                .collect();
            records = collapsed.records;
        }

        if !converged {
            warn!(
                max_passes = self.config.max_passes,
                "resolution did not converge; canonical forms may not be fixed points"
            );
        }

        if self.config.orthography {
            let recaser = Recaser::new(&self.config);
            for record in &mut records {
                if let Some(recased) = recaser.apply(&record.raw_text) {
                    debug!(from = %record.raw_text, to = %recased, "recased canonical form");
                    record.raw_text = recased;
                    stats.recased += 1;
                }
            }
        }

        info!(
            passes = stats.passes,
            merges = stats.merges,
            canonical_forms = records.len(),
            "resolution complete"
        );

        Resolution {
            originals,
            finals: records,
            traces,
            review,
            stats,
        }
    }

    /// Turn each cluster into one record carrying the canonical form, the
    /// summed frequency and the cluster's role tag.
    fn collapse(&self, records: &[Record], clusters: &[Cluster], decider: &Decider<'_>) -> Collapsed {
        let mut next = Vec::with_capacity(clusters.len());
        let mut remap = vec![0; records.len()];
        let mut links = vec![None; records.len()];

        for cluster in clusters {
            let indices: Vec<usize> = cluster.members.iter().map(|m| m.index).collect();
            let Some(canonical) = select(records, &indices, self.config.length_margin) else {
                continue;
            };
            let slot = next.len();
            for member in &cluster.members {
                remap[member.index] = slot;
                if member.index != canonical {
                    let link = decider
                        .scorer()
                        .score(
                            &records[member.index].normalized_key,
                            &records[canonical].normalized_key,
                        )
                        .unwrap_or(member.link);
                    links[member.index] = Some(link);
                }
            }
            let mut record = records[canonical].clone();
            record.frequency = cluster.total_frequency(records);
            record.role_tag = cluster.role_tag.clone();
            next.push(record);
        }

        // Same order ingestion would produce for these forms.
        let mut order: Vec<usize> = (0..next.len()).collect();
        order.sort_by(|&a, &b| {
            (&next[a].raw_text, &next[a].role_tag).cmp(&(&next[b].raw_text, &next[b].role_tag))
        });
        let mut position = vec![0; next.len()];
        for (new_pos, &old_pos) in order.iter().enumerate() {
            position[old_pos] = new_pos;
        }
        for slot in &mut remap {
            *slot = position[*slot];
        }
        let records = order.iter().map(|&i| next[i].clone()).collect();

        Collapsed {
            records,
            remap,
            links,
        }
    }
}

fn build_report(resolution: Resolution) -> Report {
    let Resolution {
        originals,
        finals,
        traces,
        review,
        mut stats,
    } = resolution;

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, trace) in traces.iter().enumerate() {
        groups.entry(trace.current).or_default().push(idx);
    }

    let mut rows = Vec::new();
    let mut clusters = Vec::new();

    for (slot, members) in groups {
        let canonical = &finals[slot];
        let cluster_id = clusters.len() + 1;
        let head = members.iter().copied().find(|&i| traces[i].method.is_none());
        let freq_canonical = head.map_or(canonical.frequency, |h| originals[h].frequency);

        let cluster_rows: Vec<MappingRow> = members
            .iter()
            .filter_map(|&i| {
                let trace = &traces[i];
                let original = &originals[i];
                let method = match trace.method {
                    Some(method) => method,
                    None if original.raw_text != canonical.raw_text => MatchMethod::Grammar,
                    None => return None,
                };
                Some(MappingRow {
                    cluster_id,
                    original: original.raw_text.clone(),
                    canonical: canonical.raw_text.clone(),
                    score: trace.score,
                    method,
                    freq_original: original.frequency,
                    freq_canonical,
                    cluster_frequency: canonical.frequency,
                })
            })
            .collect();
        if cluster_rows.is_empty() {
            continue;
        }

        let merged: Vec<f64> = cluster_rows
            .iter()
            .filter(|r| r.method != MatchMethod::Grammar)
            .map(|r| r.score)
            .collect();
        let confidence = if merged.is_empty() {
            1.0
        } else {
            merged.iter().sum::<f64>() / merged.len() as f64
        };

        let mut others: Vec<&Record> = members
            .iter()
            .filter(|&&i| Some(i) != head)
            .map(|&i| &originals[i])
            .collect();
        others.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.raw_text.cmp(&b.raw_text))
        });
        let listed: Vec<&str> = std::iter::once(canonical.raw_text.as_str())
            .chain(others.iter().map(|r| r.raw_text.as_str()))
            .collect();

        clusters.push(ClusterSummary {
            cluster_id,
            canonical: canonical.raw_text.clone(),
            members: listed.join(" | "),
            size: members.len(),
            total_frequency: canonical.frequency,
            confidence,
        });
        rows.extend(cluster_rows);
    }

    let flagged: Vec<FlaggedPair> = review
        .iter()
        .map(|pair| {
            let (a, b) = (&finals[pair.a], &finals[pair.b]);
            let (a, b) = if a.raw_text <= b.raw_text { (a, b) } else { (b, a) };
            FlaggedPair {
                text_a: a.raw_text.clone(),
                text_b: b.raw_text.clone(),
                score: pair.score.value,
                method: pair.score.method,
                freq_a: a.frequency,
                freq_b: b.frequency,
            }
        })
        .collect();
    stats.flagged = flagged.len();

    let mut report = Report {
        rows,
        clusters,
        flagged,
        stats,
    };
    report.sort();
    report
}
