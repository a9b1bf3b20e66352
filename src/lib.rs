//! # DuckDB Disjoint Table Extension
//!
//! Report-style worksheets rarely hold one clean table. They stack several
//! independent blocks separated by blank rows and columns, topped by merged
//! banner cells and closed by legend rows. This extension finds those blocks
//! and hands them to SQL.
//!
//! ## Features
//!
//! - **Formats**: Office Open XML (`.xlsx`, `.xlsm`, `.xlam`) and OpenDocument (`.ods`),
//!   from local paths or remote URLs
//! - **Merged cells**: merged regions are expanded so a banner joins the block it spans
//! - **Table discovery**: every 4-connected block of non-empty cells becomes a table
//! - **Cleanup**: duplicate banner rows at the top and legend rows at the bottom are collapsed
//! - **Typed output**: column types are inferred from the first rows or forced by glob
//!
//! ## Table Functions
//!
//! - `extract_tables`: every table cell in long form
//! - `analyze_tables`: one row per table with its range, size and markdown rendering
//! - `read_table`: one table as a typed relation
//!
//! ## Scalar Functions
//!
//! - `networkdays`: business days between two dates, both ends counted
//! - `delinquency_bucket`: ageing bucket label for a day count
extern crate duckdb;
extern crate duckdb_loadable_macros;
extern crate libduckdb_sys;

mod database;
mod error;
mod extension;
mod helpers;
mod spreadsheet;
mod table;

use crate::extension::analyze_tables::AnalyzeTablesTableFunction;
use crate::extension::extract_tables::ExtractTablesTableFunction;
use crate::extension::metrics::DelinquencyBucketScalarFunction;
use crate::extension::metrics::NetworkDaysScalarFunction;
use crate::extension::read_table::ReadTableTableFunction;
use anyhow::{Context, Result};
use duckdb::Connection;
use duckdb_loadable_macros::duckdb_entrypoint_c_api;
use libduckdb_sys as ffi;

/// Extension entry point for DuckDB.
///
/// # Errors
///
/// Returns an error if any table or scalar function fails to register with DuckDB.
#[duckdb_entrypoint_c_api()]
pub unsafe fn extension_entrypoint(connection: Connection) -> Result<()> {
    connection
        .register_table_function::<ExtractTablesTableFunction>("extract_tables")
        .context("Failed to register extract_tables table function")?;
    connection
        .register_table_function::<AnalyzeTablesTableFunction>("analyze_tables")
        .context("Failed to register analyze_tables table function")?;
    connection
        .register_table_function::<ReadTableTableFunction>("read_table")
        .context("Failed to register read_table table function")?;
    connection
        .register_scalar_function::<NetworkDaysScalarFunction>("networkdays")
        .context("Failed to register networkdays scalar function")?;
    connection
        .register_scalar_function::<DelinquencyBucketScalarFunction>("delinquency_bucket")
        .context("Failed to register delinquency_bucket scalar function")?;
    Ok(())
}
