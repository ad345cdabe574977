//! Data-source seams and sequential pagination of the curation indexer.

use crate::chain::fetch::{FetchError, Fetcher, Receipt};
use crate::chain::normalize::TimeWindow;
use crate::curation::CurationRecord;
use std::future::Future;
use tracing::{debug, info};

/// Indexer page size.
pub const PAGE_SIZE: usize = 1000;

/// Time-windowed, offset-paginated curation query.
pub trait CurationSource {
    fn curation_page(
        &self,
        window: TimeWindow,
        skip: usize,
        first: usize,
    ) -> impl Future<Output = Result<Vec<CurationRecord>, FetchError>> + Send;
}

/// Transaction receipt lookup by hash.
pub trait ReceiptSource: Sync {
    fn receipt(&self, tx_hash: &str) -> impl Future<Output = Result<Receipt, FetchError>> + Send;
}

impl CurationSource for Fetcher {
    fn curation_page(
        &self,
        window: TimeWindow,
        skip: usize,
        first: usize,
    ) -> impl Future<Output = Result<Vec<CurationRecord>, FetchError>> + Send {
        self.curations_page(window, skip, first)
    }
}

impl ReceiptSource for Fetcher {
    fn receipt(&self, tx_hash: &str) -> impl Future<Output = Result<Receipt, FetchError>> + Send {
        self.transaction_receipt(tx_hash)
    }
}

/// Page through `source` until a short or empty page. Any page error fails the whole fetch.
pub async fn fetch_all_curations<S: CurationSource>(
    source: &S,
    window: TimeWindow,
    page_size: usize,
) -> Result<Vec<CurationRecord>, FetchError> {
    let page_size = page_size.max(1);
    let mut records = Vec::new();
    let mut skip = 0;
    loop {
        let page = source.curation_page(window, skip, page_size).await?;
        let len = page.len();
        debug!(skip, len, "fetched curation page");
        records.extend(page);
        if len < page_size {
            break;
        }
        skip += page_size;
    }
    info!(
        count = records.len(),
        from = window.from,
        to = window.to,
        "curations fetched"
    );
    Ok(records)
}
