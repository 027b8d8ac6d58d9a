//! Resolution integration tests
//!
//! End-to-end scenarios over the public API, plus property-based checks of
//! the engine's guarantees.

use std::collections::HashSet;

use impress_resolve::blocking::partition;
use impress_resolve::normalize::{normalize_with_role, strip_diacritics};
use impress_resolve::{
    build_clusters, normalize, BlockingStrategy, ClusteringPolicy, Decider, Decision,
    MatchMethod, RawEntry, Record, Resolver, ResolverConfig, Scorer,
};
use proptest::prelude::*;
use rstest::rstest;

fn entries(items: &[(&str, u64)]) -> Vec<RawEntry> {
    items.iter().map(|(t, f)| RawEntry::counted(t, *f)).collect()
}

fn sequential() -> ResolverConfig {
    ResolverConfig {
        parallel: false,
        max_passes: 32,
        ..Default::default()
    }
}

// === Scenarios ===

#[test]
fn test_scenario_initials_cluster() {
    let report = Resolver::default().resolve(entries(&[
        ("Carvalho, Leonardo Rodrigues", 12),
        ("Carvalho, L. R.", 3),
        ("Carvalho, Leandro", 1),
    ]));

    assert_eq!(report.clusters.len(), 1);
    let cluster = &report.clusters[0];
    assert_eq!(cluster.canonical, "Carvalho, Leonardo Rodrigues");
    assert_eq!(cluster.size, 2);
    assert_eq!(cluster.total_frequency, 15);

    assert_eq!(
        report.canonical_of("Carvalho, L. R."),
        Some("Carvalho, Leonardo Rodrigues")
    );
    assert_eq!(report.canonical_of("Carvalho, Leandro"), None);
    assert!(report.flagged.is_empty());
}

#[test]
fn test_scenario_common_surname_rejected() {
    let report = Resolver::default().resolve(entries(&[
        ("Silva, M.", 5),
        ("Silva, Maria", 1),
        ("Silva, Marcos", 1),
    ]));

    assert!(report.is_empty(), "unexpected merges: {:?}", report.rows);
    assert_eq!(report.stats.records, 3);
    assert_eq!(report.stats.merges, 0);
}

#[test]
fn test_common_surname_with_two_initials_merges() {
    let report = Resolver::default().resolve(entries(&[
        ("Silva, João Paulo", 7),
        ("Silva, J. P.", 2),
    ]));
    assert_eq!(report.canonical_of("Silva, J. P."), Some("Silva, João Paulo"));
}

#[test]
fn test_mixed_conventions_resolve_together() {
    let report = Resolver::default().resolve(entries(&[
        ("Carvalho, Leonardo", 8),
        ("Leonardo Carvalho", 2),
    ]));
    let row = &report.rows[0];
    assert_eq!(row.original, "Leonardo Carvalho");
    assert_eq!(row.canonical, "Carvalho, Leonardo");
    assert_eq!(row.method, MatchMethod::Initials);
}

#[test]
fn test_accented_form_is_canonical() {
    let report = Resolver::default().resolve(entries(&[
        ("Joao Silva", 30),
        ("João Silva", 2),
    ]));
    assert_eq!(report.canonical_of("Joao Silva"), Some("João Silva"));
    assert_eq!(report.rows[0].method, MatchMethod::Exact);
}

#[test]
fn test_frequent_form_beats_rare_capitalized_accent() {
    let report = Resolver::default().resolve(entries(&[
        ("Joao Silva", 40),
        ("JOÃO SILVA", 2),
    ]));
    assert_eq!(report.canonical_of("JOÃO SILVA"), Some("Joao Silva"));
    assert_eq!(report.canonical_of("Joao Silva"), None);
}

#[test]
fn test_role_tags_partition_records() {
    let report = Resolver::default().resolve(entries(&[
        ("Lima, Pedro (org.)", 4),
        ("Lima, Pedro (coord.)", 3),
    ]));
    assert!(report.is_empty());
}

#[test]
fn test_subject_keywords() {
    let mut config = ResolverConfig::for_subjects();
    config.orthography = true;
    let report = Resolver::new(config).unwrap().resolve(entries(&[
        ("Educação a distância", 9),
        ("EDUCACAO A DISTANCIA", 2),
        ("Educacao a distancia", 1),
        ("Ética", 3),
    ]));
    assert_eq!(report.clusters.len(), 1);
    assert_eq!(
        report.canonical_of("EDUCACAO A DISTANCIA"),
        Some("Educação a distância")
    );
    assert_eq!(report.stats.recased, 0);
}

#[test]
fn test_bad_rows_do_not_abort() {
    let report = Resolver::default().resolve(vec![
        RawEntry::default(),
        RawEntry::counted("...", 3),
        RawEntry::counted("Lima, Pedro", 1),
    ]);
    assert_eq!(report.stats.raw_rows, 3);
    assert_eq!(report.stats.skipped, 2);
    assert_eq!(report.stats.records, 1);
}

#[test]
fn test_oversized_key_skipped_with_warning() {
    let config = ResolverConfig {
        max_key_chars: 10,
        ..sequential()
    };
    let report = Resolver::new(config).unwrap().resolve(entries(&[
        ("Carvalho, Leonardo Rodrigues", 12),
        ("Carvalho, L. R.", 3),
    ]));
    assert!(report.is_empty());
    assert_eq!(report.stats.skipped_pairs, 1);
}

#[rstest]
#[case("Silva, J.", "Silva, João")]
#[case("Carvalho, L. R.", "Carvalho, Leonardo Rodrigues")]
#[case("Smith, J.", "Smith, John")]
#[case("J. Smith", "Smith, John")]
fn test_initials_heuristic(#[case] a: &str, #[case] b: &str) {
    let config = ResolverConfig::default();
    let scorer = Scorer::new(&config);
    let score = scorer.score(&normalize(a), &normalize(b)).unwrap();
    assert!(score.value >= 0.95, "{} vs {}: {}", a, b, score.value);
}

fn run_merges(policy: ClusteringPolicy, cutoff: f64) -> usize {
    let config = ResolverConfig {
        blocking: Some(BlockingStrategy::FirstChar),
        clustering_policy: policy,
        high_confidence_cutoff: cutoff,
        ..sequential()
    };
    Resolver::new(config)
        .unwrap()
        .resolve(entries(&[
            ("Mouras, J.", 10),
            ("Moura, J.", 5),
            ("Moura, Joana", 3),
            ("Moura, Julia", 2),
        ]))
        .stats
        .merges
}

#[test]
fn test_cutoff_monotonic_only_for_transitive() {
    // "Mouras, J." ~ "Moura, J." scores 0.941; "Moura, J." reaches both
    // full forms through the initials bonus.
    assert_eq!(run_merges(ClusteringPolicy::Transitive, 0.92), 3);
    assert_eq!(run_merges(ClusteringPolicy::Transitive, 0.945), 2);

    // Star: losing the anchor link frees "Moura, J." to anchor its own
    // cluster, so a stricter cutoff merges more.
    assert_eq!(run_merges(ClusteringPolicy::Star, 0.92), 1);
    assert_eq!(run_merges(ClusteringPolicy::Star, 0.945), 2);
}

#[rstest]
#[case(0.80, 0.90)]
#[case(0.85, 0.92)]
#[case(0.90, 0.95)]
fn test_scenario_stable_across_bands(#[case] threshold: f64, #[case] cutoff: f64) {
    let config = ResolverConfig {
        similarity_threshold: threshold,
        high_confidence_cutoff: cutoff,
        ..sequential()
    };
    let report = Resolver::new(config).unwrap().resolve(entries(&[
        ("Carvalho, Leonardo Rodrigues", 12),
        ("Carvalho, L. R.", 3),
        ("Carvalho, Leandro", 1),
    ]));
    assert_eq!(report.rows.len(), 1);
}

// === Property-Based Tests ===

const POOL: &[&str] = &[
    "Carvalho, Leonardo Rodrigues",
    "Carvalho, L. R.",
    "CARVALHO, LEONARDO RODRIGUES",
    "Carvalho, Leandro",
    "Carvalho, L.",
    "Leonardo Carvalho",
    "Silva, M.",
    "Silva, Maria",
    "silva, maria",
    "Silva, João Paulo",
    "Silva, J. P.",
    "Moura, J.",
    "Moura, Joana Maria",
    "Moura, Yoana Maria",
    "Moura, Joana",
    "Moura, Joano",
    "Lima, Pedro (org.)",
    "Lima, Pedro (coord.)",
    "Lima, Pedro",
    "LIMA, PEDRO H.",
];

fn pool_entries() -> impl Strategy<Value = Vec<RawEntry>> {
    prop::collection::vec((prop::sample::select(POOL), 0u64..20), 0..14).prop_map(|items| {
        items
            .into_iter()
            .map(|(text, freq)| RawEntry::counted(text, freq))
            .collect()
    })
}

fn untagged_entries() -> impl Strategy<Value = Vec<RawEntry>> {
    let untagged: Vec<&'static str> = POOL
        .iter()
        .copied()
        .filter(|t| normalize_with_role(t).role_tag.is_none())
        .collect();
    prop::collection::vec((prop::sample::select(untagged), 0u64..20), 0..14).prop_map(|items| {
        items
            .into_iter()
            .map(|(text, freq)| RawEntry::counted(text, freq))
            .collect()
    })
}

fn roles_of(members: &str) -> HashSet<String> {
    members
        .split(" | ")
        .filter_map(|m| normalize_with_role(m).role_tag)
        .collect()
}

proptest! {
    #[test]
    fn test_normalize_deterministic(text in "\\PC{0,40}") {
        prop_assert_eq!(normalize(&text), normalize(&text));
    }

    #[test]
    fn test_normalize_accent_insensitive(text in "[a-zA-Zàáâãçéêíóôõúü ,.]{0,30}") {
        prop_assert_eq!(normalize(&text), normalize(&strip_diacritics(&text)));
        prop_assert_eq!(normalize(&text), normalize(&text.to_uppercase()));
    }

    #[test]
    fn test_score_symmetric_and_bounded(
        a in "[a-z]{1,8}, [a-z]{1,8}( [a-z]{1,8})?",
        b in "[a-z]{1,8}, [a-z]{1,8}( [a-z]{1,8})?",
    ) {
        let config = ResolverConfig::default();
        let scorer = Scorer::new(&config);
        let ab = scorer.score(&a, &b).unwrap();
        let ba = scorer.score(&b, &a).unwrap();
        prop_assert_eq!(ab, ba);
        prop_assert!((0.0..=1.0).contains(&ab.value));
    }

    #[test]
    fn test_canonicalize_idempotent(input in pool_entries(), orthography in any::<bool>()) {
        let config = ResolverConfig { orthography, ..sequential() };
        let resolver = Resolver::new(config).unwrap();
        let once = resolver.canonicalize(input);
        let twice = resolver.canonicalize(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_canonical_output_resolves_to_nothing(input in pool_entries()) {
        let resolver = Resolver::new(sequential()).unwrap();
        let once = resolver.canonicalize(input);
        let report = resolver.resolve(once);
        prop_assert!(report.rows.is_empty());
    }

    #[test]
    fn test_review_threshold_monotonic(input in pool_entries(), low in 0.5f64..0.92, delta in 0.0f64..0.4) {
        // Merges depend on the cutoff only; the threshold just narrows the review band.
        let high = (low + delta).min(0.92);
        let loose = ResolverConfig { similarity_threshold: low, ..sequential() };
        let strict = ResolverConfig { similarity_threshold: high, ..sequential() };
        let a = Resolver::new(loose).unwrap().resolve(input.clone());
        let b = Resolver::new(strict).unwrap().resolve(input);
        prop_assert_eq!(b.stats.merges, a.stats.merges);
        prop_assert!(b.flagged.len() <= a.flagged.len());
    }

    #[test]
    fn test_cutoff_monotonic_transitive(
        input in untagged_entries(),
        low in 0.85f64..1.0,
        delta in 0.0f64..0.15,
        first_char in any::<bool>(),
    ) {
        let high = (low + delta).min(1.0);
        let config = |cutoff| ResolverConfig {
            high_confidence_cutoff: cutoff,
            clustering_policy: ClusteringPolicy::Transitive,
            blocking: first_char.then_some(BlockingStrategy::FirstChar),
            ..sequential()
        };
        let loose = Resolver::new(config(low)).unwrap().resolve(input.clone());
        let strict = Resolver::new(config(high)).unwrap().resolve(input);
        prop_assert!(strict.stats.merges <= loose.stats.merges);
    }

    #[test]
    fn test_role_partition_in_report(input in pool_entries(), transitive in any::<bool>()) {
        let config = ResolverConfig {
            clustering_policy: if transitive { ClusteringPolicy::Transitive } else { ClusteringPolicy::Star },
            ..sequential()
        };
        let report = Resolver::new(config).unwrap().resolve(input);
        for cluster in &report.clusters {
            prop_assert!(roles_of(&cluster.members).len() <= 1, "mixed roles: {}", cluster.members);
        }
    }

    #[test]
    fn test_role_partition_in_clusters(
        picks in prop::collection::vec(
            (prop::sample::select(POOL), prop::sample::select(&["", "org", "coord", "ed"][..]), 1u64..9),
            1..12,
        ),
        transitive in any::<bool>(),
    ) {
        let records: Vec<Record> = picks
            .iter()
            .map(|(text, role, freq)| {
                let role = (!role.is_empty()).then_some(*role);
                Record::new(text, *freq, role, "p")
            })
            .collect();
        let config = sequential();
        let decider = Decider::new(&config);
        let blocks = partition(&records, config.blocking_strategy());
        let policy = if transitive { ClusteringPolicy::Transitive } else { ClusteringPolicy::Star };
        let clustering = build_clusters(&records, &blocks, &decider, policy, false);

        for cluster in &clustering.clusters {
            let tags: HashSet<&str> = cluster
                .members
                .iter()
                .filter_map(|m| records[m.index].role_tag.as_deref())
                .collect();
            prop_assert!(tags.len() <= 1);
        }
        for pair in &clustering.review {
            let verdict = decider.decide(&records[pair.a], &records[pair.b]).unwrap();
            prop_assert_eq!(verdict.decision, Decision::Review);
        }
    }
}
