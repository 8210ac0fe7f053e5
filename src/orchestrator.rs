//! Concurrent resolution of a page's server references.
//!
//! Every reference is resolved independently, with at most
//! `max_concurrency` in flight and each capped by a per-task timeout. A
//! failing reference only loses its own links. All work lives inside the
//! returned future; dropping it cancels every in-flight fetch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::ResolverConfig;
use crate::error::{ErrorKind, ExtractError};
use crate::http_client::{Fetcher, HttpFetcher};
use crate::link::{Extraction, PlayableLink, ServerReference};
use crate::registry::ExtractorRegistry;

/// Outcome counts for one [`LinkResolver::resolve_all_with_report`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Distinct references tried.
    pub attempted: usize,
    /// References that yielded at least one link.
    pub succeeded: usize,
    pub failures: HashMap<ErrorKind, usize>,
}

impl ResolutionReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    #[must_use]
    pub fn failures_of(&self, kind: ErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }
}

/// Fans server references out to the registry.
#[derive(Clone)]
pub struct LinkResolver {
    registry: Arc<ExtractorRegistry>,
    fetcher: Arc<dyn Fetcher>,
    task_timeout: Duration,
    max_concurrency: usize,
}

impl LinkResolver {
    /// Resolver with built-in extractors and default limits.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_config(fetcher, &ResolverConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn Fetcher>, config: &ResolverConfig) -> Self {
        Self {
            registry: Arc::new(ExtractorRegistry::with_config(config)),
            fetcher,
            task_timeout: config.task_timeout(),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Resolver over a real HTTP client built from `config`.
    pub fn from_config(config: &ResolverConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::with_config(config)?;
        Ok(Self::with_config(Arc::new(fetcher), config))
    }

    #[must_use]
    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub(crate) fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Resolve every reference and return the links of those that worked.
    ///
    /// Output follows reference order (after deduplication), and within a
    /// reference, discovery order.
    pub async fn resolve_all(
        &self,
        references: &[ServerReference],
        page_referer: Option<&str>,
    ) -> Vec<PlayableLink> {
        self.resolve_all_with_report(references, page_referer)
            .await
            .0
            .links
    }

    /// Like [`resolve_all`](Self::resolve_all), keeping subtitles and
    /// per-kind failure counts.
    pub async fn resolve_all_with_report(
        &self,
        references: &[ServerReference],
        page_referer: Option<&str>,
    ) -> (Extraction, ResolutionReport) {
        let mut seen = HashSet::new();
        let unique: Vec<&ServerReference> = references.iter().filter(|r| seen.insert(*r)).collect();

        let mut report = ResolutionReport {
            attempted: unique.len(),
            ..ResolutionReport::default()
        };
        if unique.is_empty() {
            return (Extraction::default(), report);
        }

        let mut outcomes: Vec<_> = stream::iter(unique.into_iter().enumerate())
            .map(|(index, reference)| async move {
                (index, reference, self.resolve_one(reference, page_referer).await)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut merged = Extraction::default();
        let mut seen_subtitles = HashSet::new();
        for (_, reference, outcome) in outcomes {
            match outcome {
                Ok(extraction) => {
                    report.succeeded += 1;
                    merged.links.extend(extraction.links);
                    merged.subtitles.extend(
                        extraction
                            .subtitles
                            .into_iter()
                            .filter(|s| seen_subtitles.insert(s.url.clone())),
                    );
                }
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Server reference failed");
                    *report.failures.entry(e.kind()).or_default() += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            links = merged.links.len(),
            "Resolved server references"
        );
        (merged, report)
    }

    async fn resolve_one(
        &self,
        reference: &ServerReference,
        page_referer: Option<&str>,
    ) -> Result<Extraction, ExtractError> {
        let task = self
            .registry
            .resolve_server(self.fetcher.as_ref(), reference, page_referer);

        match tokio::time::timeout(self.task_timeout, task).await {
            Ok(result) => result,
            Err(_) => Err(ExtractError::unreachable(
                reference.as_str(),
                format!("timed out after {:?}", self.task_timeout),
            )),
        }
    }
}

impl std::fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkResolver")
            .field("registry", &self.registry)
            .field("task_timeout", &self.task_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}
