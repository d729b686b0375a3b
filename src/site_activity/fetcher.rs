//! Batch fetcher: page 0 for the total, then bounded waves for the rest.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::waves::run_in_waves;
use super::{AggregateResult, FetchError, PageError, PageRequest, PageResult, PageSource};
use crate::types::{FetcherConfig, SiteQuery};

pub struct BatchFetcher {
    source: Arc<dyn PageSource>,
    page_size: u64,
    max_concurrent: usize,
    max_attempts: u32,
    request_timeout: Duration,
}

impl BatchFetcher {
    pub fn new(config: &FetcherConfig, source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            page_size: config.page_size.max(1),
            max_concurrent: config.max_concurrent.max(1),
            max_attempts: config.max_attempts.max(1),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Retrieve every page for `query`.
    ///
    /// Fails only when page 0 fails (after its retry) or reports no sites.
    /// Later page failures are recorded in `failed_offsets`.
    pub async fn fetch_all(&self, query: &SiteQuery) -> Result<AggregateResult, FetchError> {
        let call_id = uuid::Uuid::new_v4();
        log::info!(
            "site_activity[{}]: fetching source={} siteType={} pageSize={} maxConcurrent={}",
            call_id,
            query.source,
            query.site_type,
            self.page_size,
            self.max_concurrent
        );

        let first = fetch_with_retry(
            self.source.clone(),
            PageRequest::new(0, self.page_size, query.clone()),
            self.max_attempts,
            self.request_timeout,
        )
        .await
        .map_err(|failure| {
            log::warn!(
                "site_activity[{}]: first page failed after {} attempt(s): {}",
                call_id,
                failure.attempts,
                failure.error
            );
            FetchError::Foundational {
                attempts: failure.attempts,
                source: failure.error,
            }
        })?;

        let total_requested = first.total_count;
        if total_requested == 0 {
            log::info!("site_activity[{}]: upstream reported 0 sites", call_id);
            return Err(FetchError::NoRecords);
        }

        let mut records = first.records;
        let mut failed_offsets = BTreeSet::new();

        let offsets = remaining_offsets(total_requested, self.page_size);
        if !offsets.is_empty() {
            log::info!(
                "site_activity[{}]: {} sites, {} more pages in waves of {}",
                call_id,
                total_requested,
                offsets.len(),
                self.max_concurrent
            );
        }

        let source = self.source.clone();
        let (page_size, max_attempts, timeout) =
            (self.page_size, self.max_attempts, self.request_timeout);
        let settled = run_in_waves(offsets, self.max_concurrent, |offset| {
            fetch_with_retry(
                source.clone(),
                PageRequest::new(offset, page_size, query.clone()),
                max_attempts,
                timeout,
            )
        })
        .await;

        // `settled` is already in ascending offset order.
        for page in settled {
            match page.outcome {
                Ok(Ok(result)) => records.extend(result.records),
                Ok(Err(failure)) => {
                    log::warn!(
                        "site_activity[{}]: page at offset {} failed after {} attempt(s): {}",
                        call_id,
                        page.item,
                        failure.attempts,
                        failure.error
                    );
                    failed_offsets.insert(page.item);
                }
                Err(e) => {
                    log::warn!(
                        "site_activity[{}]: page task at offset {} aborted: {}",
                        call_id,
                        page.item,
                        e
                    );
                    failed_offsets.insert(page.item);
                }
            }
        }

        let aggregate = AggregateResult {
            total_returned: records.len() as u64,
            records,
            total_requested,
            failed_offsets,
        };

        match aggregate.warning() {
            Some(warning) => log::warn!("site_activity[{}]: {}", call_id, warning),
            None => log::info!(
                "site_activity[{}]: returned {} of {} sites",
                call_id,
                aggregate.total_returned,
                aggregate.total_requested
            ),
        }

        Ok(aggregate)
    }
}

/// Offsets after page 0: `page_size, 2*page_size, ... < total`.
fn remaining_offsets(total: u64, page_size: u64) -> Vec<u64> {
    (1..)
        .map(|n| n * page_size)
        .take_while(|offset| *offset < total)
        .collect()
}

/// Last error of a page that gave up, with the attempts it took.
#[derive(Debug)]
struct PageFailure {
    error: PageError,
    attempts: u32,
}

/// One page with an explicit attempt budget. Each attempt gets its own
/// timeout; only timeouts and 504s are retried, immediately.
async fn fetch_with_retry(
    source: Arc<dyn PageSource>,
    request: PageRequest,
    max_attempts: u32,
    timeout: Duration,
) -> Result<PageResult, PageFailure> {
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(timeout, source.fetch_page(&request)).await {
            Ok(result) => result,
            Err(_) => Err(PageError::Timeout(timeout.as_secs())),
        };

        match result {
            Ok(page) => return Ok(page),
            Err(e) if e.is_retryable() && attempt < attempts => {
                log::warn!(
                    "site_activity: retry {}/{} for offset {} after: {}",
                    attempt,
                    attempts,
                    request.offset,
                    e
                );
                attempt += 1;
            }
            Err(error) => return Err(PageFailure { error, attempts: attempt }),
        }
    }
}
