use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Timelike;
use iso8601_duration::Duration as IsoDuration;
use std::fmt::Display;

/// Largest date serial a workbook can hold, 9999-12-31.
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Text, inline or resolved from the shared string table
    Text,
    /// Error values such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date/time patterns.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }

    fn is_serial(&self) -> bool {
        matches!(
            self,
            Self::NumberDateTime1900 | Self::NumberDate1900 | Self::NumberTime1900
                | Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904
        )
    }
}

/// A typed cell value as stored in the file, before any column conversion.
///
/// Two values are equal when both the type and the raw text match, which is
/// what banner de-duplication compares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CellValue {
    /// Cell data type
    pub(crate) kind: CellType,
    /// Raw value text (serial number, ISO string, text or error code)
    pub(crate) value: String,
}

/// A value with its position in the sheet.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) value: CellValue,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }
}

impl CellValue {
    pub(crate) fn new(kind: CellType, value: impl Into<String>) -> Self {
        CellValue {
            kind,
            value: value.into(),
        }
    }

    pub(crate) fn text(value: impl Into<String>) -> Self {
        Self::new(CellType::Text, value)
    }

    /// Converts cell value to boolean (1 = true, other = false).
    pub(crate) fn to_boolean(&self) -> bool {
        match self.kind {
            CellType::Boolean => self.value == "1",
            _ => self.value.eq_ignore_ascii_case("true") || self.value == "1",
        }
    }

    /// Converts cell value to 64-bit integer, parsing only leading numeric characters.
    pub(crate) fn to_bigint(&self) -> Result<i64, String> {
        let end = self.value
            .char_indices()
            .find(|(_, char)| !char.is_ascii_digit() && *char != '-')
            .map(|(index, _)| index)
            .unwrap_or(self.value.len());
        self.value[..end]
            .parse::<i64>()
            .map_err(|_| format!("parse '{}' to bigint failed", self.value))
    }

    /// Converts cell value to double-precision floating point.
    pub(crate) fn to_double(&self) -> Result<f64, String> {
        self.value.parse::<f64>().map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    /// Converts cell value to days since 1970-01-01 epoch.
    /// Handles Excel date formats (1900 and 1904 epochs) and ISO dates.
    pub(crate) fn to_date(&self) -> Result<i32, String> {
        match self.kind {
            kind if kind.is_serial() => {
                let days = parse_date_serial(&self.value)?.trunc() as i32;
                let offset = if kind.is_1904() {
                    1_461
                } else if days >= 60 {
                    -1 // Lotus 1-2-3 leap year bug
                } else {
                    0
                };
                Ok(days - 25_568 + offset)
            }
            CellType::IsoDateTime => {
                let date = self.value.split('T').next().unwrap_or_default();
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|_| format!("parse '{}' to NaiveDate failed", self.value))
                    .map(|date| date.to_epoch_days())
            }
            CellType::IsoDuration => Ok(0), // Duration only used for ods time
            _ => Err(format!("parse '{}' to date failed", self.value)),
        }
    }

    /// Converts cell value to microseconds since midnight.
    /// Handles Excel time formats and ISO time/duration formats.
    pub(crate) fn to_time(&self) -> Result<i64, String> {
        match self.kind {
            kind if kind.is_serial() => {
                let serial = self.to_double()?;
                if !serial.is_finite() {
                    return Err(format!("parse '{}' to time failed", self.value));
                }
                Ok((serial.fract() * MICROS_PER_DAY as f64).round() as i64)
            }
            CellType::IsoDateTime => {
                NaiveDateTime::parse_from_str(&self.value, "%Y-%m-%dT%H:%M:%S%.f")
                    .map_err(|_| format!("parse '{}' to NaiveDateTime failed", self.value))
                    .map(|datetime| {
                        let time = datetime.time();
                        let seconds = time.num_seconds_from_midnight() as i64;
                        let nanoseconds = time.nanosecond() as i64;
                        (seconds * 1_000_000) + (nanoseconds / 1_000)
                    })
            }
            CellType::IsoDuration => {
                let duration = self.value
                    .parse::<IsoDuration>()
                    .map_err(|_| format!("parse '{}' to iso8601 duration failed", self.value))?;
                let hour = duration.hour as i64;
                let minute = duration.minute as i64;
                let second = duration.second as f64;
                Ok((hour * 3600 + minute * 60) * 1_000_000 + (second * 1_000_000f64).round() as i64)
            }
            _ => Err(format!("parse '{}' to time failed", self.value)),
        }
    }

    /// Converts cell value to microseconds since 1970-01-01 epoch.
    /// Handles Excel datetime formats and ISO datetime formats.
    pub(crate) fn to_datetime(&self) -> Result<i64, String> {
        match self.kind {
            kind if kind.is_serial() => {
                let days = self.to_date()? as i64;
                let time = self.to_time()?;
                days.checked_mul(MICROS_PER_DAY)
                    .and_then(|micros| micros.checked_add(time))
                    .ok_or_else(|| format!("parse '{}' to datetime failed", self.value))
            }
            CellType::IsoDateTime => {
                let datetime = if self.value.contains('T') {
                    NaiveDateTime::parse_from_str(&self.value, "%Y-%m-%dT%H:%M:%S%.f")
                        .map_err(|_| format!("parse '{}' to NaiveDateTime failed", self.value))
                } else {
                    NaiveDate::parse_from_str(&self.value, "%Y-%m-%d")
                        .map_err(|_| format!("parse '{}' to NaiveDate failed", self.value))
                        .map(|date| date.and_time(chrono::NaiveTime::MIN))
                };
                datetime.map(|datetime| datetime.and_utc().timestamp_micros())
            }
            CellType::IsoDuration => self.to_time(),
            _ => Err(format!("parse '{}' to datetime failed", self.value)),
        }
    }

    /// Formats the value the way it reads in the sheet; falls back to the raw text
    /// when a date serial cannot be decoded.
    fn format(&self) -> Result<String, String> {
        let value = match self.kind {
            CellType::Boolean => if self.value == "1" { "true" } else { "false" }.to_owned(),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => {
                to_datetime_string(&self.value, self.kind.is_1904())?
            }
            CellType::NumberDate1900 | CellType::NumberDate1904 => {
                to_date_string(&self.value, self.kind.is_1904())?
            }
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value)?,
            CellType::IsoDateTime => self.value.replace('T', " "),
            CellType::IsoDuration => self
                .value
                .replace("PT", "")
                .replace('H', ":")
                .replace('M', ":")
                .replace('S', ""),
            _ => self.value.to_owned(),
        };
        Ok(value)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.format() {
            Ok(value) => write!(f, "{}", value),
            Err(_) => write!(f, "{}", self.value),
        }
    }
}

/// Parses a date serial, rejecting values past 9999-12-31 or before the epoch.
fn parse_date_serial(value: &str) -> Result<f64, String> {
    let serial = value
        .parse::<f64>()
        .map_err(|_| format!("parse '{}' to double failed", value))?;
    if (0.0..MAX_DATE_SERIAL + 1.0).contains(&serial) {
        Ok(serial)
    } else {
        Err(format!("date serial '{}' out of range", value))
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
fn to_date_string(value: &str, is_1904: bool) -> Result<String, String> {
    let days = parse_date_serial(value)?.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal");
    Duration::try_days(days + offset)
        .and_then(|delta| epoch.checked_add_signed(delta))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| format!("date serial '{}' out of range", value))
}

/// Converts the fractional part of an Excel serial to an ISO time string.
fn to_time_string(value: &str) -> Result<String, String> {
    let serial = value
        .parse::<f64>()
        .map_err(|_| format!("parse '{}' to double failed", value))?;
    if !serial.is_finite() {
        return Err(format!("parse '{}' to time failed", value));
    }
    let mut remainder = (serial.fract().abs() * 86_400_000f64).round() as i64;
    let milliseconds = remainder % 1_000;
    remainder /= 1_000;
    let seconds = remainder % 60;
    remainder /= 60;
    let minutes = remainder % 60;
    let hours = remainder / 60;
    let timestamp = if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    };
    Ok(timestamp)
}

/// Converts Excel numeric datetime to ISO datetime string.
fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, String> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Ok(format!("{date} {time}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_number_formats() {
        assert_eq!(CellType::parse_custom_number_format("mm/dd/yyyy", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd hh:mm", true), CellType::NumberDateTime1904);
        assert_eq!(CellType::parse_custom_number_format("hh:mm:ss", false), CellType::NumberTime1900);
        assert_eq!(CellType::parse_custom_number_format("0.00\" days\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]#,##0", false), CellType::Number);
    }

    #[test]
    fn display_dates() {
        assert_eq!(CellValue::new(CellType::NumberDate1900, "45554").to_string(), "2024-09-19");
        assert_eq!(CellValue::new(CellType::NumberDateTime1900, "45554.5").to_string(), "2024-09-19 12:00:00");
        assert_eq!(CellValue::new(CellType::NumberTime1900, "0.75").to_string(), "18:00:00");
        assert_eq!(CellValue::new(CellType::NumberDate1900, "oops").to_string(), "oops");
        assert_eq!(CellValue::new(CellType::Boolean, "1").to_string(), "true");
        assert_eq!(CellValue::new(CellType::IsoDateTime, "2024-09-19T08:30:00").to_string(), "2024-09-19 08:30:00");
    }

    #[test]
    fn conversions() {
        let date = CellValue::new(CellType::NumberDate1900, "45554");
        assert_eq!(date.to_date(), Ok(NaiveDate::from_ymd_opt(2024, 9, 19).unwrap().to_epoch_days()));
        assert_eq!(CellValue::new(CellType::Number, "42.0").to_bigint(), Ok(42));
        assert_eq!(CellValue::new(CellType::Number, "2.5").to_double(), Ok(2.5));
        assert_eq!(CellValue::new(CellType::NumberTime1900, "0.5").to_time(), Ok(43_200_000_000));
        assert_eq!(CellValue::new(CellType::IsoDuration, "PT01H30M00S").to_time(), Ok(5_400_000_000));
        assert!(CellValue::text("n/a").to_double().is_err());
        assert!(CellValue::text("n/a").to_date().is_err());
    }

    #[test]
    fn display_out_of_range_serials_as_raw_text() {
        assert_eq!(CellValue::new(CellType::NumberDate1900, "1e20").to_string(), "1e20");
        assert_eq!(CellValue::new(CellType::NumberDate1900, "99999999").to_string(), "99999999");
        assert_eq!(CellValue::new(CellType::NumberDateTime1900, "99999999999").to_string(), "99999999999");
        assert_eq!(CellValue::new(CellType::NumberDateTime1904, "-1").to_string(), "-1");
        assert_eq!(CellValue::new(CellType::NumberTime1900, "inf").to_string(), "inf");
        assert_eq!(CellValue::new(CellType::NumberDate1900, "2958465").to_string(), "9999-12-31");
    }

    #[test]
    fn out_of_range_serials_fail_conversion() {
        let huge = CellValue::new(CellType::NumberDateTime1900, "99999999999");
        assert_eq!(huge.to_date(), Err("date serial '99999999999' out of range".to_owned()));
        assert!(huge.to_datetime().is_err());
        assert!(CellValue::new(CellType::NumberDate1904, "NaN").to_date().is_err());
        assert!(CellValue::new(CellType::NumberTime1900, "inf").to_time().is_err());

        let last = CellValue::new(CellType::NumberDateTime1900, "2958465.5");
        let days = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap().to_epoch_days() as i64;
        assert_eq!(last.to_datetime(), Ok(days * 86_400_000_000 + 43_200_000_000));
    }

    #[test]
    fn date_system_1904() {
        let first = CellValue::new(CellType::NumberDate1904, "0");
        assert_eq!(first.to_date(), Ok(NaiveDate::from_ymd_opt(1904, 1, 1).unwrap().to_epoch_days()));
        assert_eq!(first.to_string(), "1904-01-01");
    }

    #[test]
    fn equality_includes_type() {
        assert_eq!(CellValue::text("1"), CellValue::text("1"));
        assert_ne!(CellValue::text("1"), CellValue::new(CellType::Number, "1"));
    }
}
