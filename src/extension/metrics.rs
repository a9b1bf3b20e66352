//! # Metric Scalar Functions
//!
//! Day-count helpers used when turning an extracted case table into a report:
//!
//! - `networkdays(start, end)`: business days between two dates, both ends counted
//! - `delinquency_bucket(days)`: ageing bucket label for a day count
use crate::extension::writer::write_primitive;
use duckdb::core::DataChunkHandle;
use duckdb::core::Inserter;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vscalar::ScalarFunctionSignature;
use duckdb::vscalar::VScalar;
use duckdb::vtab::arrow::WritableVector;
use libduckdb_sys::duckdb_date;
use std::error::Error;

/// Weekdays (Monday to Friday) in the half-open day range `[start, end)`, with
/// days counted from 1970-01-01.
fn weekdays_between(start: i32, end: i32) -> i64 {
    let span = i64::from(end) - i64::from(start);
    // 1970-01-01 was a Thursday, 3 days after Monday
    let first = (i64::from(start) + 3).rem_euclid(7);
    let mut count = span / 7 * 5;
    for offset in 0..span % 7 {
        if (first + offset) % 7 < 5 {
            count += 1;
        }
    }
    count
}

/// Business days from `start` to `end`, counting the end date.
///
/// When `end` precedes `start` the weekdays in `[end, start)` count negatively,
/// so the result can be zero or negative.
pub(crate) fn business_days(start: i32, end: i32) -> i64 {
    if end >= start {
        weekdays_between(start, end) + 1
    } else {
        1 - weekdays_between(end, start)
    }
}

/// Ageing bucket of a day count.
pub(crate) fn delinquency_bucket(days: i64) -> &'static str {
    match days {
        days if days >= 90 => "> 90 Days",
        days if days >= 60 => "> 60 Days",
        days if days >= 30 => "> 30 Days",
        _ => "< 30 Days",
    }
}

/// `networkdays(DATE, DATE) -> BIGINT`, NULL when either date is NULL.
pub(crate) struct NetworkDaysScalarFunction;

impl VScalar for NetworkDaysScalarFunction {
    type State = ();

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        let rows = input.len();
        let starts = input.flat_vector(0);
        let ends = input.flat_vector(1);
        let start_days = starts.as_slice_with_len::<duckdb_date>(rows);
        let end_days = ends.as_slice_with_len::<duckdb_date>(rows);
        let mut result = output.flat_vector();
        for row in 0..rows {
            if starts.row_is_null(row as u64) || ends.row_is_null(row as u64) {
                result.set_null(row);
            } else {
                write_primitive(&mut result, row, business_days(start_days[row].days, end_days[row].days));
            }
        }
        Ok(())
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![
                LogicalTypeHandle::from(LogicalTypeId::Date),
                LogicalTypeHandle::from(LogicalTypeId::Date),
            ],
            LogicalTypeHandle::from(LogicalTypeId::Bigint),
        )]
    }
}

/// `delinquency_bucket(BIGINT) -> VARCHAR`, NULL for NULL.
pub(crate) struct DelinquencyBucketScalarFunction;

impl VScalar for DelinquencyBucketScalarFunction {
    type State = ();

    unsafe fn invoke(
        _: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        let rows = input.len();
        let days = input.flat_vector(0);
        let values = days.as_slice_with_len::<i64>(rows);
        let mut result = output.flat_vector();
        for row in 0..rows {
            if days.row_is_null(row as u64) {
                result.set_null(row);
            } else {
                result.insert(row, delinquency_bucket(values[row]));
            }
        }
        Ok(())
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Bigint)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, day: u32) -> i32 {
        NaiveDate::from_ymd_opt(year, month, day).unwrap().to_epoch_days()
    }

    #[test]
    fn business_days_count_both_ends() {
        // 2024-09-16 is a Monday
        assert_eq!(business_days(day(2024, 9, 16), day(2024, 9, 16)), 1);
        assert_eq!(business_days(day(2024, 9, 16), day(2024, 9, 20)), 5);
        assert_eq!(business_days(day(2024, 9, 16), day(2024, 9, 23)), 6);
        assert_eq!(business_days(day(2024, 9, 20), day(2024, 9, 23)), 2);
        assert_eq!(business_days(day(2024, 9, 16), day(2024, 10, 16)), 23);
    }

    #[test]
    fn business_days_over_weekends_and_backwards() {
        assert_eq!(business_days(day(2024, 9, 21), day(2024, 9, 22)), 1);
        assert_eq!(business_days(day(2024, 9, 21), day(2024, 9, 23)), 1);
        assert_eq!(business_days(day(2024, 9, 23), day(2024, 9, 20)), 0);
        assert_eq!(business_days(day(2024, 9, 20), day(2024, 9, 16)), -3);
        assert_eq!(business_days(day(1969, 12, 29), day(1970, 1, 2)), 5);
    }

    #[test]
    fn delinquency_bucket_boundaries() {
        assert_eq!(delinquency_bucket(-4), "< 30 Days");
        assert_eq!(delinquency_bucket(29), "< 30 Days");
        assert_eq!(delinquency_bucket(30), "> 30 Days");
        assert_eq!(delinquency_bucket(59), "> 30 Days");
        assert_eq!(delinquency_bucket(60), "> 60 Days");
        assert_eq!(delinquency_bucket(89), "> 60 Days");
        assert_eq!(delinquency_bucket(90), "> 90 Days");
    }
}
