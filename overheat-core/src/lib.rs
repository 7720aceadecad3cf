/// Overheat Core - BTC/ETH market temperature monitor
///
/// Periodically samples price plus six positioning metrics per asset, scores
/// each metric against its own rolling history and folds the z-scores into a
/// 0-100 "overheat score":
/// - `history`: bounded per-(asset, metric) rolling windows, file backed
/// - `score`: z-score, signed weighting, clip and rescale
/// - `classify`: Overheat / Oversold / Normal from two thresholds
/// - `cycle`: one fetch, score, classify, notify, persist pass
/// - `notify`: email and ServerChan fan-out with per-channel isolation
/// - `scheduler`: fixed-interval driver with manual triggers
pub mod classify;
pub mod config;
pub mod cycle;
pub mod error;
pub mod history;
pub mod metric;
pub mod notify;
pub mod persist;
pub mod record;
pub mod scheduler;
pub mod score;
pub mod source;

// Re-export commonly used types for convenience
pub use classify::{AlertKind, AlertState, Thresholds, classify};
pub use config::Config;
pub use cycle::{CheckCycle, CycleReport, CycleState, RunCycle};
pub use error::{ConfigError, CycleError, FetchError, NotifyError, SchedulerError, StoreError};
pub use history::{FileHistoryStore, HistoryKey, HistoryStore, HistoryWindow, MemoryHistoryStore};
pub use metric::{Asset, Metric, MetricReading, MetricSnapshot};
pub use notify::{Delivery, NotificationDispatcher, Notifier, NotifyMessage};
pub use persist::JsonFileStore;
pub use record::{AlertEvent, CheckRecord, LastRun, LastRunStore};
pub use scheduler::{Scheduler, SchedulerHandle, TickOutcome};
pub use score::{MetricWeights, ScoreEngine, ScoreResult};
pub use source::{CoinGecko, Glassnode, MetricSource, PriceQuote, PriceSource};
