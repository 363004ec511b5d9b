use std::fmt::Display;

/// Insert thousands separators into the integer part of a numeric value.
///
/// Grouping is three digits from the decimal point leftwards; a leading sign
/// is preserved and any decimal fraction passes through unmodified. Always
/// comma separator and period decimal, no locale awareness.
pub fn number_with_commas(value: impl Display) -> String {
    let raw = value.to_string();

    let (sign, rest) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(number_with_commas(1000), "1,000");
        assert_eq!(number_with_commas(1000000), "1,000,000");
        assert_eq!(number_with_commas(1234567), "1,234,567");
    }

    #[test]
    fn leaves_small_numbers_alone() {
        assert_eq!(number_with_commas(0), "0");
        assert_eq!(number_with_commas(7), "7");
        assert_eq!(number_with_commas(999), "999");
    }

    #[test]
    fn keeps_negative_sign() {
        assert_eq!(number_with_commas(-1000), "-1,000");
        assert_eq!(number_with_commas(-999), "-999");
    }

    #[test]
    fn fraction_passes_through() {
        assert_eq!(number_with_commas(1000.5), "1,000.5");
        assert_eq!(number_with_commas("2500.00"), "2,500.00");
        assert_eq!(number_with_commas("0.123456"), "0.123456");
    }

    #[test]
    fn accepts_numeric_strings() {
        assert_eq!(number_with_commas("1000"), "1,000");
        assert_eq!(number_with_commas("987654321"), "987,654,321");
    }
}
