//! Caching availability checker
//!
//! The catalog accepts one `%` wildcard per query. Filenames are reduced to
//! a wildcard pattern using the shape of the name, so that one query answers
//! for a whole observation or product group. Results are memoized per
//! pattern for the lifetime of the cache.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::catalog::CatalogClient;

/// Source of wildcard filename queries
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn files_by_pattern(&self, pattern: &str) -> jsaproc_core::Result<Vec<String>>;
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn files_by_pattern(&self, pattern: &str) -> jsaproc_core::Result<Vec<String>> {
        Ok(CatalogClient::files_by_pattern(self, pattern).await?)
    }
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    async fn files_by_pattern(&self, pattern: &str) -> jsaproc_core::Result<Vec<String>> {
        (**self).files_by_pattern(pattern).await
    }
}

#[derive(Debug, Clone, Copy)]
enum Template {
    /// `{0}%`
    Prefix,
    /// `{0}%{1}`
    Around,
}

struct Rule {
    regex: Regex,
    template: Template,
}

fn rule(pattern: &str, template: Template) -> Rule {
    Rule {
        regex: Regex::new(pattern).expect("constant regex pattern is valid"),
        template,
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        // SCUBA-2 raw file
        rule(r"^(s[48][abcd][0-9]{8}_[0-9]{5}_)[0-9]{4}$", Template::Prefix),
        // SCUBA-2 reduced file
        rule(
            r"^(jcmts[0-9]{8}_[0-9]{5}_[48]50_)[-_a-z0-9]+(_[0-9]{3})\.fits$",
            Template::Around,
        ),
        // SCUBA-2 public file
        rule(
            r"^(jcmts[48]50um_)[-a-z]+([0-9]{6}_pub_[0-9]{3})\.fits$",
            Template::Around,
        ),
        // Preview for SCUBA-2 reduced observation
        rule(
            r"^(jcmt_scuba2_[0-9]{5}_[0-9t]{15}_)[-_a-z0-9]+_preview_[0-9]{2,4}\.png$",
            Template::Prefix,
        ),
        // Preview for SCUBA-2 public product
        rule(
            r"^(jcmt_scuba-2-[0-9]{6}_(?:healpix|extent|peak)-[48]50um_preview_)[0-9]{2,4}\.png$",
            Template::Prefix,
        ),
        // ACSIS/DAS reduced file
        rule(
            r"^(jcmth[0-9]{8}_[0-9]{5}_[0-9]{2}_)[-_a-z0-9]+(_[0-9]{3})\.fits$",
            Template::Around,
        ),
        // Preview for ACSIS/DAS reduced observation
        rule(
            r"^(jcmt_(?:acsis|das)_[0-9]{1,5}_[0-9t]{15}_)[-_a-z0-9]+_preview_[0-9]{2,4}\.png$",
            Template::Prefix,
        ),
        // Preview for nightly group
        rule(
            r"^(jcmt_[0-9]{8}-[0-9a-f]{32}_)[-_a-z0-9]+_preview_[0-9]{2,4}\.png$",
            Template::Prefix,
        ),
    ]
    .into_iter()
    .collect()
});

/// Wildcard pattern expected to match `filename` and its siblings
///
/// The first matching rule wins. A name matching no rule is its own pattern.
pub fn derive_pattern(filename: &str) -> String {
    for rule in RULES.iter() {
        let Some(caps) = rule.regex.captures(filename) else {
            continue;
        };

        let head = caps.get(1).map_or("", |m| m.as_str());
        return match rule.template {
            Template::Prefix => format!("{}%", head),
            Template::Around => {
                let tail = caps.get(2).map_or("", |m| m.as_str());
                format!("{}%{}", head, tail)
            }
        };
    }

    filename.to_string()
}

/// Availability checker memoizing catalog results per pattern
pub struct AvailabilityCache<C> {
    source: C,
    found: HashMap<String, Vec<String>>,
}

impl<C: CatalogSource> AvailabilityCache<C> {
    pub fn new(source: C) -> Self {
        Self {
            source,
            found: HashMap::new(),
        }
    }

    /// Check which files the archive holds
    ///
    /// Returns one flag per input name, in order. A file is present when its
    /// name, with everything from the first `.` removed, is listed for its
    /// pattern. Any failed query fails the whole check.
    pub async fn check_files(&mut self, filenames: &[String]) -> jsaproc_core::Result<Vec<bool>> {
        let mut present = Vec::with_capacity(filenames.len());

        for filename in filenames {
            let pattern = derive_pattern(filename);

            if !self.found.contains_key(&pattern) {
                let files = self.source.files_by_pattern(&pattern).await?;
                debug!("Pattern {} matched {} files", pattern, files.len());
                self.found.insert(pattern.clone(), files);
            }

            let base = filename.split('.').next().unwrap_or(filename);
            let found = self
                .found
                .get(&pattern)
                .is_some_and(|files| files.iter().any(|f| f == base));
            present.push(found);
        }

        Ok(present)
    }

    /// Number of patterns queried so far
    pub fn cached_patterns(&self) -> usize {
        self.found.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsaproc_core::ProcError;
    use std::sync::Mutex;

    struct FakeCatalog {
        files: Vec<String>,
        queries: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeCatalog {
        fn new(files: &[&str]) -> Self {
            Self {
                files: files.iter().map(|f| f.to_string()).collect(),
                queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn shared(files: &[&str]) -> Arc<Self> {
            Arc::new(Self::new(files))
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn files_by_pattern(&self, pattern: &str) -> jsaproc_core::Result<Vec<String>> {
            self.queries.lock().unwrap().push(pattern.to_string());
            if self.fail {
                return Err(ProcError::Remote("503 Server Error".into()));
            }
            let prefix = pattern.split('%').next().unwrap_or(pattern);
            Ok(self
                .files
                .iter()
                .filter(|f| f.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_derive_pattern_rules() {
        assert_eq!(
            derive_pattern("s4a20200101_00001_0001"),
            "s4a20200101_00001_%"
        );
        assert_eq!(
            derive_pattern("jcmts20140101_00012_850_reduced_001.fits"),
            "jcmts20140101_00012_850_%_001"
        );
        assert_eq!(
            derive_pattern("jcmts850um_healpix005432_pub_000.fits"),
            "jcmts850um_%005432_pub_000"
        );
        assert_eq!(
            derive_pattern("jcmt_scuba2_00012_20140101t012345_reduced_preview_64.png"),
            "jcmt_scuba2_00012_20140101t012345_%"
        );
        assert_eq!(
            derive_pattern("jcmt_scuba-2-005432_healpix-850um_preview_1024.png"),
            "jcmt_scuba-2-005432_healpix-850um_preview_%"
        );
        assert_eq!(
            derive_pattern("jcmth20140101_00012_01_reduced001_obs_000.fits"),
            "jcmth20140101_00012_01_%_000"
        );
        assert_eq!(
            derive_pattern("jcmt_acsis_12_20140101t012345_reduced_preview_256.png"),
            "jcmt_acsis_12_20140101t012345_%"
        );
        assert_eq!(
            derive_pattern(
                "jcmt_20140101-0123456789abcdef0123456789abcdef_reduced_preview_64.png"
            ),
            "jcmt_20140101-0123456789abcdef0123456789abcdef_%"
        );
    }

    #[test]
    fn test_unmatched_name_is_literal() {
        assert_eq!(derive_pattern("random_file.txt"), "random_file.txt");
        // Raw names with a suffix do not match the raw rule.
        assert_eq!(
            derive_pattern("s4a20200101_00001_0001.sdf"),
            "s4a20200101_00001_0001.sdf"
        );
    }

    #[tokio::test]
    async fn test_shared_pattern_queried_once() {
        let catalog = FakeCatalog::shared(&["s4a20200101_00001_0001", "s4a20200101_00001_0003"]);
        let mut cache = AvailabilityCache::new(Arc::clone(&catalog));

        let result = cache
            .check_files(&names(&[
                "s4a20200101_00001_0001",
                "s4a20200101_00001_0002",
                "s4a20200101_00001_0003",
            ]))
            .await
            .unwrap();

        assert_eq!(result, vec![true, false, true]);
        assert_eq!(catalog.queries(), vec!["s4a20200101_00001_%"]);
        assert_eq!(cache.cached_patterns(), 1);
    }

    #[tokio::test]
    async fn test_cache_persists_between_calls() {
        let catalog = FakeCatalog::shared(&["s4a20200101_00001_0001"]);
        let mut cache = AvailabilityCache::new(Arc::clone(&catalog));

        cache
            .check_files(&names(&["s4a20200101_00001_0001"]))
            .await
            .unwrap();
        let again = cache
            .check_files(&names(&["s4a20200101_00001_0002"]))
            .await
            .unwrap();

        assert_eq!(again, vec![false]);
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_extension_stripped_before_match() {
        let catalog = FakeCatalog::shared(&["jcmts20140101_00012_850_reduced_001"]);
        let mut cache = AvailabilityCache::new(Arc::clone(&catalog));

        let result = cache
            .check_files(&names(&[
                "jcmts20140101_00012_850_reduced_001.fits",
                "jcmts20140101_00012_850_extent_001.fits",
            ]))
            .await
            .unwrap();

        assert_eq!(result, vec![true, false]);
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let catalog = FakeCatalog::shared(&[]);
        let mut cache = AvailabilityCache::new(Arc::clone(&catalog));
        assert!(cache.check_files(&[]).await.unwrap().is_empty());
        assert!(catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_query_fails_check() {
        let catalog = Arc::new(FakeCatalog {
            fail: true,
            ..FakeCatalog::new(&[])
        });
        let mut cache = AvailabilityCache::new(Arc::clone(&catalog));

        let err = cache
            .check_files(&names(&["s4a20200101_00001_0001"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcError::Remote(_)));
        assert_eq!(cache.cached_patterns(), 0);
    }
}
