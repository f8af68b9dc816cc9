//! Indicator datasets: synthetic generation and file loading.
//!
//! Synthetic datasets are used by the simulation commands and the scenario
//! tests. Every generator takes the caller's RNG so a seeded `StdRng` gives a
//! reproducible run.

use crate::indicator::{Indicator, IndicatorError, IndicatorKind};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TLDS: &[&str] = &["com", "net", "org", "io", "ru", "cn", "info", "biz"];
const URL_PATHS: &[&str] = &["login", "update", "payload", "gate", "admin", "dl"];
const URL_EXTENSIONS: &[&str] = &["php", "exe", "html", "zip", "js"];

/// Dataset errors
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to read indicator file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Indicator {
        path: PathBuf,
        line: usize,
        #[source]
        source: IndicatorError,
    },
}

/// Kind of synthetic indicators to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DatasetKind {
    Ip,
    Domain,
    Url,
    Hash,
    /// Equal share of every other kind
    Mixed,
}

impl DatasetKind {
    /// Indicator kind for normalization, `None` for mixed sets.
    pub fn indicator_kind(&self) -> Option<IndicatorKind> {
        match self {
            Self::Ip => Some(IndicatorKind::Ip),
            Self::Domain => Some(IndicatorKind::Domain),
            Self::Url => Some(IndicatorKind::Url),
            Self::Hash => Some(IndicatorKind::FileHash),
            Self::Mixed => None,
        }
    }
}

fn random_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..=223u8),
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen_range(1..=254u8)
    )
}

fn random_label<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(6..=14);
    (0..len)
        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
        .collect()
}

fn random_domain<R: Rng + ?Sized>(rng: &mut R) -> String {
    let tld = TLDS.choose(rng).copied().unwrap_or("com");
    format!("{}.{}", random_label(rng), tld)
}

fn random_url<R: Rng + ?Sized>(rng: &mut R) -> String {
    let scheme = if rng.gen_bool(0.5) { "http" } else { "https" };
    let path = URL_PATHS.choose(rng).copied().unwrap_or("index");
    let ext = URL_EXTENSIONS.choose(rng).copied().unwrap_or("html");
    format!(
        "{}://{}/{}/{}.{}",
        scheme,
        random_domain(rng),
        path,
        random_label(rng),
        ext
    )
}

fn random_hash<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

fn random_indicator<R: Rng + ?Sized>(kind: DatasetKind, index: usize, rng: &mut R) -> String {
    match kind {
        DatasetKind::Ip => random_ip(rng),
        DatasetKind::Domain => random_domain(rng),
        DatasetKind::Url => random_url(rng),
        DatasetKind::Hash => random_hash(rng),
        DatasetKind::Mixed => {
            let kinds = [
                DatasetKind::Ip,
                DatasetKind::Domain,
                DatasetKind::Url,
                DatasetKind::Hash,
            ];
            random_indicator(kinds[index % kinds.len()], index, rng)
        }
    }
}

/// Generate `size` distinct indicators of `kind`.
pub fn synthetic<R: Rng + ?Sized>(size: usize, kind: DatasetKind, rng: &mut R) -> Vec<String> {
    let mut seen = HashSet::with_capacity(size);
    let mut items = Vec::with_capacity(size);
    while items.len() < size {
        let candidate = random_indicator(kind, items.len(), rng);
        if seen.insert(candidate.clone()) {
            items.push(candidate);
        }
    }
    items
}

/// Two datasets sharing exactly `floor(min(size1, size2) * pct / 100)` items.
///
/// Returns both shuffled lists and the true overlap.
pub fn with_overlap<R: Rng + ?Sized>(
    size1: usize,
    size2: usize,
    overlap_percentage: f64,
    kind: DatasetKind,
    rng: &mut R,
) -> Result<(Vec<String>, Vec<String>, usize), DatasetError> {
    if !(0.0..=100.0).contains(&overlap_percentage) {
        return Err(DatasetError::InvalidParameter(format!(
            "overlap percentage must be within [0, 100], got {}",
            overlap_percentage
        )));
    }

    let overlap = (size1.min(size2) as f64 * overlap_percentage / 100.0).floor() as usize;
    let pool = synthetic(size1 + size2 - overlap, kind, rng);

    let (shared, rest) = pool.split_at(overlap);
    let (only1, only2) = rest.split_at(size1 - overlap);

    let mut set1: Vec<String> = shared.iter().chain(only1).cloned().collect();
    let mut set2: Vec<String> = shared.iter().chain(only2).cloned().collect();
    set1.shuffle(rng);
    set2.shuffle(rng);

    Ok((set1, set2, overlap))
}

/// Load and normalize one indicator per line.
///
/// Blank lines and `#` comments are skipped. Duplicates (after normalization)
/// are kept once, in first-seen order.
pub fn load_from_file(
    path: &Path,
    kind: Option<IndicatorKind>,
) -> Result<Vec<Indicator>, DatasetError> {
    let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    let mut indicators = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indicator =
            Indicator::parse(trimmed, kind).map_err(|source| DatasetError::Indicator {
                path: path.to_path_buf(),
                line: number + 1,
                source,
            })?;
        if seen.insert(indicator.clone()) {
            indicators.push(indicator);
        }
    }

    tracing::debug!(path = %path.display(), count = indicators.len(), "Loaded indicators");
    Ok(indicators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_synthetic_is_distinct_and_sized() {
        for kind in [
            DatasetKind::Ip,
            DatasetKind::Domain,
            DatasetKind::Url,
            DatasetKind::Hash,
            DatasetKind::Mixed,
        ] {
            let items = synthetic(200, kind, &mut rng());
            assert_eq!(items.len(), 200);
            let unique: HashSet<_> = items.iter().collect();
            assert_eq!(unique.len(), 200, "duplicates for {:?}", kind);
        }
    }

    #[test]
    fn test_synthetic_items_match_their_kind() {
        let mut rng = rng();
        for ip in synthetic(20, DatasetKind::Ip, &mut rng) {
            assert_eq!(IndicatorKind::detect(&ip), IndicatorKind::Ip);
        }
        for hash in synthetic(20, DatasetKind::Hash, &mut rng) {
            assert_eq!(IndicatorKind::detect(&hash), IndicatorKind::FileHash);
        }
        for url in synthetic(20, DatasetKind::Url, &mut rng) {
            assert_eq!(IndicatorKind::detect(&url), IndicatorKind::Url);
        }
    }

    #[test]
    fn test_synthetic_is_reproducible_with_seed() {
        let a = synthetic(50, DatasetKind::Domain, &mut rng());
        let b = synthetic(50, DatasetKind::Domain, &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_overlap_exact_count() {
        let (set1, set2, overlap) =
            with_overlap(100, 50, 50.0, DatasetKind::Ip, &mut rng()).unwrap();

        assert_eq!(set1.len(), 100);
        assert_eq!(set2.len(), 50);
        assert_eq!(overlap, 25);

        let s1: HashSet<_> = set1.iter().collect();
        let s2: HashSet<_> = set2.iter().collect();
        assert_eq!(s1.intersection(&s2).count(), 25);
    }

    #[test]
    fn test_with_overlap_bounds() {
        let (set1, set2, overlap) =
            with_overlap(40, 40, 0.0, DatasetKind::Hash, &mut rng()).unwrap();
        assert_eq!(overlap, 0);
        let s1: HashSet<_> = set1.iter().collect();
        assert!(set2.iter().all(|item| !s1.contains(item)));

        let (set1, set2, overlap) =
            with_overlap(40, 40, 100.0, DatasetKind::Hash, &mut rng()).unwrap();
        assert_eq!(overlap, 40);
        let s1: HashSet<_> = set1.iter().collect();
        assert!(set2.iter().all(|item| s1.contains(item)));
    }

    #[test]
    fn test_with_overlap_rejects_bad_percentage() {
        assert!(matches!(
            with_overlap(10, 10, 100.5, DatasetKind::Ip, &mut rng()),
            Err(DatasetError::InvalidParameter(_))
        ));
        assert!(matches!(
            with_overlap(10, 10, -1.0, DatasetKind::Ip, &mut rng()),
            Err(DatasetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_from_file_skips_comments_and_normalizes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# feed export").unwrap();
        writeln!(file, "Evil.Example.com").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "evil.example.com.").unwrap();
        writeln!(file, "  other.example.org  ").unwrap();

        let loaded = load_from_file(file.path(), Some(IndicatorKind::Domain)).unwrap();
        let values: Vec<&str> = loaded.iter().map(|i| i.as_str()).collect();
        assert_eq!(values, vec!["evil.example.com", "other.example.org"]);
    }

    #[test]
    fn test_load_from_file_reports_line_of_bad_indicator() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "abcdef").unwrap();
        writeln!(file, "not-hex!").unwrap();

        // "not-hex!" keeps only the hex chars 'e'; "zz" would be empty
        let loaded = load_from_file(file.path(), Some(IndicatorKind::FileHash)).unwrap();
        assert_eq!(loaded.len(), 2);

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "abcdef").unwrap();
        writeln!(file, "zz").unwrap();
        let err = load_from_file(file.path(), Some(IndicatorKind::FileHash)).unwrap_err();
        assert!(matches!(err, DatasetError::Indicator { line: 2, .. }));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = load_from_file(Path::new("/nonexistent/indicators.txt"), None);
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }
}
