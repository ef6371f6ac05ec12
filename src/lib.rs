pub mod core;
pub mod schema;
pub mod catalog;
pub mod store;
pub mod router;
pub mod analysis;
pub mod index;
pub mod parallel;
pub mod writer;
pub mod reader;
pub mod query;
pub mod scoring;
pub mod search;
pub mod drilldown;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::secure::{AllowAllGate, AuthorizationGate, Permission, SecureAnalyticsDataService, StaticPermissionGate};
pub use crate::core::service::AnalyticsDataService;
pub use crate::core::stats::{IndexingStatsSnapshot, ServiceStats};
pub use crate::core::types::{Record, RecordValue, TIME_MAX, TIME_MIN};
pub use crate::drilldown::request::{AnalyticsDrillDownRange, AnalyticsDrillDownRequest, CategoryDrillDownRequest, SubCategories};
pub use crate::reader::record_reader::AnalyticsRecordReader;
pub use crate::schema::schema::{AnalyticsSchema, ColumnDefinition, ColumnType};
pub use crate::search::results::SearchResultEntry;
pub use crate::store::memory::InMemoryRecordStore;
pub use crate::store::record_store::{GroupSelection, RecordGroup, RecordIter, RecordStore};

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                          ANALYTICS DATA SERVICE ARCHITECTURE                          │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── FACADE LAYER ────────────────────────────────────┐
│                                                                                       │
│  ┌──────────────────────────────────┐      ┌──────────────────────────────────────┐  │
│  │ SecureAnalyticsDataService<G>    │ ───► │ struct AnalyticsDataService          │  │
│  │ • gate: G: AuthorizationGate     │      │ • catalog: Arc<TableCatalog>         │  │
│  │ • service                        │      │ • store: Arc<dyn RecordStore>        │  │
│  └──────────────────────────────────┘      │ • pipeline: Arc<IndexingPipeline>    │  │
│                                             │ • router: RecordRouter               │  │
│                                             │ • engine: Arc<SearchEngine>          │  │
│                                             │ • drilldown: DrillDownAggregator     │  │
│                                             └──────────────────────────────────────┘  │
└───────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── WRITE PATH ─────────────────────────────────────┐
│                                                                                       │
│  put/delete ──► RecordRouter ──► RecordStore::put        (synchronous, durable)      │
│                      │                                                                │
│                      └────────► IndexingPipeline::enqueue (bounded, blocks when full) │
│                                        │                                              │
│                   crc32(table, id) % shards                                           │
│                                        ▼                                              │
│        ┌────────────┐ ┌────────────┐ ┌────────────┐                                   │
│        │ shard 0    │ │ shard 1    │ │ shard N    │   ShardWorker: batch, analyze     │
│        │ queue+thrd │ │ queue+thrd │ │ queue+thrd │   (rayon above threshold), apply  │
│        └─────┬──────┘ └─────┬──────┘ └─────┬──────┘   with retry budget               │
│              ▼              ▼              ▼                                          │
│        TableSegment   TableSegment   TableSegment    (copy-on-write, per shard of the │
│                                                       TableEntry's own TableIndex)    │
│                                                                                       │
│  IndexingBarrier: enqueued/processed per shard, wait_for_indexing snapshots targets   │
└───────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── READ PATH ─────────────────────────────────────┐
│                                                                                       │
│  search ──► QueryParser ──► QueryPlanner ──► QueryOptimizer ──► QueryCache?           │
│                                                                  │                    │
│                             IndexReader (pinned Arc snapshot of every segment)        │
│                                                                  ▼                    │
│                  QueryExecutor per segment (rayon) ──► TopKCollector merge             │
│                                                                                       │
│  drilldown ──► same plan + zero-boost Facet / NumericRange filters                    │
│                  ──► FacetIndex::children / NumericIndex::range aggregation           │
│                                                                                       │
│  get ──► RecordRouter ──► RecordStore::plan_* ──► Vec<RecordGroup> (serializable)     │
└───────────────────────────────────────────────────────────────────────────────────────┘
*/
