//! Impress Resolve - Fuzzy identity resolution for bibliographic metadata
//!
//! Collapses spelling, casing, accent and abbreviation variants of person
//! names and subject keywords into one canonical form per real-world
//! entity, and reports the mapping from every variant to its canonical.
//!
//! - **Normalize**: accent- and case-insensitive comparison keys, role qualifiers detached
//! - **Blocking**: surname or first-character blocks bound the comparison cost
//! - **Similarity**: Ratcliff/Obershelp ratio plus the initials heuristic
//! - **Decision**: auto-merge / review / reject bands, role and common-surname guards
//! - **Cluster**: star (anchor-only) or transitive clustering per block
//! - **Canonical**: accented, unabbreviated, frequent, well-cased forms win
//! - **Orthography**: optional recasing of ALL-CAPS and all-lowercase forms
//! - **Report**: mapping rows, cluster summaries, review flags, statistics
//! - **Authority**: matching terms against an official reference list
//! - **Source**: delimited-text loader with encoding and header handling
//!
//! # Pipeline
//!
//! ```text
//! RawEntry → ingest → partition → decide → cluster → select → Report
//!                        ↑                               │
//!                        └──── until a pass merges nothing
//! ```

pub mod authority;
pub mod blocking;
pub mod canonical;
pub mod cluster;
pub mod config;
pub mod decision;
pub mod error;
pub mod normalize;
pub mod orthography;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod similarity;
pub mod source;

pub use authority::{AuthorityIndex, AuthorityMatch};
pub use blocking::{partition, Block, BlockingStrategy};
pub use canonical::select;
pub use cluster::{build_clusters, Cluster, ClusteringPolicy};
pub use config::{EntityKind, ResolverConfig};
pub use decision::{Decider, Decision, Verdict};
pub use error::{ConfigError, ReportError, ResolveError, Result, ScoreError, SourceError};
pub use normalize::{normalize, split_name, NameParts};
pub use pipeline::Resolver;
pub use record::{ingest, split_subject_terms, RawEntry, Record};
pub use report::{ClusterSummary, FlaggedPair, MappingRow, Report, ResolutionStats};
pub use similarity::{MatchMethod, PairScore, Scorer};
pub use source::{load_entries, SourceOptions};
