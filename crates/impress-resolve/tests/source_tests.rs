//! File-level integration tests: loader, config files and report output

use std::fs;
use std::io::Write;

use impress_resolve::{
    load_entries, AuthorityIndex, ClusteringPolicy, ConfigError, EntityKind, MatchMethod,
    Resolver, ResolverConfig, SourceError, SourceOptions,
};
use tempfile::{tempdir, NamedTempFile};

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

// === Loader ===

#[test]
fn test_load_and_resolve() {
    let input = write_temp(
        "nome,frequencia\n\
         Carvalho, Leonardo Rodrigues,12\n\
         Carvalho, L. R.,3\n\
         Carvalho, Leandro,1\n\
         \"Carvalho, L. R.\",2\n"
            .as_bytes(),
    );
    let entries = load_entries(input.path(), SourceOptions::default()).unwrap();
    assert_eq!(entries.len(), 4);

    let report = Resolver::default().resolve(entries);
    assert_eq!(report.stats.raw_rows, 4);
    assert_eq!(report.stats.records, 3);
    let row = &report.rows[0];
    assert_eq!(row.original, "Carvalho, L. R.");
    assert_eq!(row.freq_original, 5);
    assert_eq!(row.cluster_frequency, 17);
}

#[test]
fn test_latin1_input() {
    let input = write_temp(b"Jo\xE3o Silva,2\nJoao Silva,5\n");
    let entries = load_entries(input.path(), SourceOptions::default()).unwrap();
    let report = Resolver::default().resolve(entries);
    assert_eq!(report.canonical_of("Joao Silva"), Some("João Silva"));
}

#[test]
fn test_missing_input_is_fatal() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.csv");
    let result = load_entries(&missing, SourceOptions::default());
    assert!(matches!(result, Err(SourceError::NotFound(_))));
}

#[test]
fn test_empty_file_yields_empty_report() {
    let input = write_temp(b"");
    let entries = load_entries(input.path(), SourceOptions::default()).unwrap();
    assert!(entries.is_empty());
    let report = Resolver::default().resolve(entries);
    assert!(report.is_empty());
    assert!(report.clusters.is_empty());
}

// === Config Files ===

#[test]
fn test_config_from_toml_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resolve.toml");
    fs::write(
        &path,
        r#"
entity = "subject"
clustering_policy = "transitive"
similarity_threshold = 0.8
high_confidence_cutoff = 0.9
"#,
    )
    .unwrap();

    let config = ResolverConfig::from_file(&path).unwrap();
    assert_eq!(config.entity, EntityKind::Subject);
    assert_eq!(config.clustering_policy, ClusteringPolicy::Transitive);
    assert_eq!(config.similarity_threshold, 0.8);
    assert_eq!(config.length_margin, 5);
}

#[test]
fn test_config_from_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("resolve.json");
    fs::write(&path, r#"{"orthography": true, "min_shared_initials": 3}"#).unwrap();

    let config = ResolverConfig::from_file(&path).unwrap();
    assert!(config.orthography);
    assert_eq!(config.min_shared_initials, 3);
}

#[test]
fn test_invalid_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "similarity_threshold = 0.97\n").unwrap();
    assert!(matches!(
        ResolverConfig::from_file(&path),
        Err(ConfigError::InvalidThresholds(_))
    ));

    let missing = dir.path().join("none.toml");
    assert!(matches!(
        ResolverConfig::from_file(&missing),
        Err(ConfigError::Unreadable { .. })
    ));
}

// === Report Output ===

#[test]
fn test_report_csv_file() {
    let report = Resolver::default().resolve(vec![
        impress_resolve::RawEntry::counted("Carvalho, Leonardo Rodrigues", 12),
        impress_resolve::RawEntry::counted("Carvalho, L. R.", 3),
    ]);

    let dir = tempdir().unwrap();
    let path = dir.path().join("report.csv");
    report
        .write_csv(fs::File::create(&path).unwrap(), b';')
        .unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(&path)
        .unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[1], "original");
    assert_eq!(&headers[4], "method");
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "Carvalho, L. R.");
    assert_eq!(&rows[0][2], "Carvalho, Leonardo Rodrigues");
    assert_eq!(&rows[0][4], "initials");
}

// === Authority Matching ===

#[test]
fn test_authority_list_from_file() {
    let official = write_temp("Carvalho, Leonardo Rodrigues,40\nSouza, Ana Maria,10\n".as_bytes());
    let terms = write_temp("Carvalho, L. R.,3\nSOUZA, ANA MARIA,1\nLima, Pedro,2\n".as_bytes());

    let config = ResolverConfig::default();
    let index = AuthorityIndex::new(
        &config,
        load_entries(official.path(), SourceOptions::default()).unwrap(),
    );
    let matches = index.resolve_terms(load_entries(terms.path(), SourceOptions::default()).unwrap());

    let by_term = |t: &str| matches.iter().find(|m| m.term == t).unwrap();
    assert_eq!(by_term("Carvalho, L. R.").method, Some(MatchMethod::Initials));
    assert_eq!(
        by_term("SOUZA, ANA MARIA").official.as_deref(),
        Some("Souza, Ana Maria")
    );
    assert!(!by_term("Lima, Pedro").is_matched());
}
