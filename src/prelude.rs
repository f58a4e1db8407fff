pub use crate::cache::SetAssocCache;
pub use crate::error::{BuildError, ConfigError};
pub use crate::runtime::{JobBody, JobId, JobPool, JobScheduler};
pub use crate::sort::{
    parallel_sort, parallel_sort_by, parallel_sort_with_progress, ParallelSorter,
    ParallelSorterBuilder,
};
pub use crate::traits::{ProgressSink, Writeout};

#[cfg(feature = "metrics")]
pub use crate::metrics::CacheMetricsSnapshot;
