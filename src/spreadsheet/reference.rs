//! Conversions between A1-style references and 0-based (row, column) indexes.

/// Converts a 0-based column index to its letters (0 -> `A`, 26 -> `AA`).
pub(crate) fn col_to_letters(col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    let mut number = col + 1;
    while number > 0 {
        number -= 1;
        letters.push(b'A' + (number % 26) as u8);
        number /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Converts 0-based indexes to a reference such as `C7`.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letters(col), row + 1)
}

/// Parses column letters (case-insensitive) to a 0-based index; empty or non-letter input gives None.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |index, letter| {
        if letter.is_ascii_alphabetic() {
            let digit = letter.to_ascii_uppercase() as usize - 'A' as usize + 1;
            index.checked_mul(26)?.checked_add(digit)
        } else {
            None
        }
    }).map(|index| index - 1)
}

/// Parses a 1-based row number to a 0-based index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .map(|row| row - 1)
}

/// Parses a reference such as `B3` or `$B$3` to 0-based (row, column).
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, number) = reference.split_at(split);
    Some((row_to_index(number)?, col_to_index(letters)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip_boundaries() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
        assert_eq!(col_to_index("A"), Some(0));
        assert_eq!(col_to_index("az"), Some(51));
        assert_eq!(col_to_index("AAA"), Some(702));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(9, 27), "AB10");
        assert_eq!(reference_to_index("AB10"), Some((9, 27)));
        assert_eq!(reference_to_index("$C$7"), Some((6, 2)));
        assert_eq!(reference_to_index("C0"), None);
        assert_eq!(reference_to_index("7"), None);
        assert_eq!(reference_to_index("C"), None);
    }
}
