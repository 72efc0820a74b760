mod repository;
mod schema;

pub use repository::{ChainOrder, Counter, Repository};
