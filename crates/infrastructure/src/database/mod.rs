pub mod batch_table;
pub mod executor;
pub mod job_graph;
pub mod job_parent_table;
pub mod job_table;
pub mod manager;
pub mod mapping;
pub mod predicate;
pub mod retry;
pub mod schema;
pub mod table;

pub use batch_table::BatchTable;
pub use executor::StatementExecutor;
pub use job_graph::JobsBuilder;
pub use job_parent_table::JobParentTable;
pub use job_table::JobTable;
pub use manager::{DatabaseManager, DatabaseType};
pub use mapping::{MappingHelpers, Statement};
pub use predicate::{build_predicate, quote_identifier, Predicate};
pub use retry::RetryPolicy;
pub use schema::{BATCH_TABLE, JOBS_PARENTS_TABLE, JOBS_TABLE};
pub use table::RecordTable;
