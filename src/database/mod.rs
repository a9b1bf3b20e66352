//! DuckDB-facing building blocks: parameter value access, typed columns and A1 ranges.
pub(crate) mod bridge;
pub(crate) mod column;
pub(crate) mod range;
