use crate::wire::DashboardSummary;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Read side of an [`crate::Aggregator`].
///
/// Each load returns the summary published at the last bucket close as a whole;
/// readers never observe a half-updated bucket. Cloning is cheap.
#[derive(Clone)]
pub struct SummaryReader {
    pub(crate) published: Arc<ArcSwap<DashboardSummary>>,
}

impl SummaryReader {
    pub(crate) fn new() -> Self {
        Self {
            published: Arc::new(ArcSwap::from_pointee(DashboardSummary {
                ok: true,
                ..Default::default()
            })),
        }
    }

    pub fn load(&self) -> Arc<DashboardSummary> {
        self.published.load_full()
    }

    pub fn with<R>(&self, handler: impl FnOnce(&DashboardSummary) -> R) -> R {
        handler(&self.published.load())
    }

    pub(crate) fn publish(&self, summary: DashboardSummary) {
        self.published.store(Arc::new(summary));
    }
}
