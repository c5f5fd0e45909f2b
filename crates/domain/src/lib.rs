pub mod columns;
pub mod entities;
pub mod query;
pub mod repositories;

pub use batch_core::{BatchError, BatchResult};
pub use columns::*;
pub use entities::*;
pub use query::*;
pub use repositories::*;
