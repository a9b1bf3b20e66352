use crate::database::range::Range;
use glob::Pattern;
use std::collections::HashSet;

/// Which sheets to read and how raw cell values are filtered on the way in.
#[derive(Clone, Debug, Default)]
pub(crate) struct Criteria {
    /// Sheet name patterns; every sheet matches when there are none.
    pub(crate) sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read.
    pub(crate) sheet_limit: Option<usize>,

    /// Area of each sheet to read; cells and merges outside it are dropped.
    pub(crate) range: Option<Range>,

    /// Literal values read as empty cells.
    pub(crate) nulls: HashSet<String>,

    /// Read error cells (`#DIV/0!`, `#N/A`...) as empty instead of as text.
    pub(crate) error_as_null: bool,

    /// Record merged regions.
    pub(crate) merge_cells: bool,
}

impl Criteria {
    /// Checks if a sheet name matches any pattern; everything matches when there are none.
    pub(crate) fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }

    /// Checks whether `count` sheets already fill the sheet limit.
    pub(crate) fn is_full(&self, count: usize) -> bool {
        self.sheet_limit.map(|limit| count >= limit).unwrap_or(false)
    }

    pub(crate) fn is_null(&self, value: &str) -> bool {
        self.nulls.contains(value)
    }
}
