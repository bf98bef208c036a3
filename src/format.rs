//! Display normalization for times and French phone numbers.
//!
//! Hosts type "15h", "1530" or "06.12.34.56.78"; guests should read
//! "15:00" and "06 12 34 56 78". Both functions are display-only: input
//! they do not understand comes back unchanged.

/// Normalize a time of day to `HH:MM`.
///
/// `h`, `.` and `,` count as separators, whitespace is ignored, and bare
/// digit runs are read as `H`, `HH`, `HMM` or `HHMM`.
///
/// ```
/// use house_guide::format::format_time_display;
/// assert_eq!(format_time_display("15h"), "15:00");
/// assert_eq!(format_time_display("9h30"), "09:30");
/// assert_eq!(format_time_display("1530"), "15:30");
/// assert_eq!(format_time_display("vers midi"), "vers midi");
/// ```
pub fn format_time_display(input: &str) -> String {
    let raw = input.trim().to_lowercase();
    if raw.is_empty() {
        return input.to_string();
    }
    let s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if matches!(c, '.' | ',' | 'h') { ':' } else { c })
        .collect();
    let digits = |part: &str| part.chars().filter(char::is_ascii_digit).collect::<String>();

    let (hours, mut minutes) = if s.contains(':') {
        let mut parts = s.split(':');
        let hours = digits(parts.next().unwrap_or_default());
        let minutes = digits(parts.next().unwrap_or_default());
        (hours, if minutes.is_empty() { "00".to_string() } else { minutes })
    } else if (1..=4).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit()) {
        match s.len() {
            1 | 2 => (s.clone(), "00".to_string()),
            3 => (s[..1].to_string(), s[1..].to_string()),
            _ => (s[..2].to_string(), s[2..].to_string()),
        }
    } else {
        return input.to_string();
    };
    minutes.truncate(2);

    let parse = |v: &str| if v.is_empty() { Some(0) } else { v.parse::<u32>().ok() };
    match (parse(&hours), parse(&minutes)) {
        (Some(h), Some(m)) if h <= 23 && m <= 59 => format!("{h:02}:{m:02}"),
        _ => input.to_string(),
    }
}

/// Group digits in pairs from the left: `"0612345678"` → `"06 12 34 56 78"`.
fn group_pairs(digits: &str) -> String {
    digits
        .as_bytes()
        .chunks(2)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a phone number the French way.
///
/// - Input that already contains spaces keeps its layout, with runs of
///   whitespace collapsed.
/// - A `00` prefix becomes `+`.
/// - `+33` numbers become `+33 6 12 34 56 78` (trunk `0` dropped).
/// - Ten-digit national numbers become `06 12 34 56 78`.
/// - Anything else is grouped in pairs, keeping a leading `+`.
pub fn format_phone_fr(input: &str) -> String {
    let raw = input.trim();
    if raw.is_empty() {
        return input.to_string();
    }
    if raw.chars().any(char::is_whitespace) {
        return raw.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    let s = match raw.strip_prefix("00") {
        Some(rest) => format!("+{rest}"),
        None => raw.to_string(),
    };
    let has_plus = s.starts_with('+');
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return raw.to_string();
    }

    if s.starts_with("+33") {
        let rest = &digits[2..];
        let rest = rest.strip_prefix('0').unwrap_or(rest);
        let Some(first) = rest.chars().next() else {
            return "+33".to_string();
        };
        let tail = group_pairs(&rest[1..]);
        return if tail.is_empty() {
            format!("+33 {first}")
        } else {
            format!("+33 {first} {tail}")
        };
    }

    if !has_plus && digits.len() == 10 && digits.starts_with('0') {
        return group_pairs(&digits);
    }

    let grouped = group_pairs(&digits);
    if has_plus {
        format!("+{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // format_time_display()
    // =========================================================================

    #[test]
    fn time_with_separators() {
        assert_eq!(format_time_display("15h"), "15:00");
        assert_eq!(format_time_display("15H30"), "15:30");
        assert_eq!(format_time_display("9.5"), "09:05");
        assert_eq!(format_time_display("11,00"), "11:00");
        assert_eq!(format_time_display(" 16 : 00 "), "16:00");
    }

    #[test]
    fn time_digit_runs() {
        assert_eq!(format_time_display("9"), "09:00");
        assert_eq!(format_time_display("14"), "14:00");
        assert_eq!(format_time_display("930"), "09:30");
        assert_eq!(format_time_display("1530"), "15:30");
    }

    #[test]
    fn time_minutes_truncated_to_two_digits() {
        assert_eq!(format_time_display("10:305"), "10:30");
    }

    #[test]
    fn time_out_of_range_or_unknown_passes_through() {
        assert_eq!(format_time_display("25h"), "25h");
        assert_eq!(format_time_display("1275"), "1275");
        assert_eq!(format_time_display("vers midi"), "vers midi");
        assert_eq!(format_time_display("12345"), "12345");
        assert_eq!(format_time_display("   "), "   ");
    }

    // =========================================================================
    // format_phone_fr()
    // =========================================================================

    #[test]
    fn phone_national() {
        assert_eq!(format_phone_fr("0612345678"), "06 12 34 56 78");
        assert_eq!(format_phone_fr("06.12.34.56.78"), "06 12 34 56 78");
    }

    #[test]
    fn phone_international_french() {
        assert_eq!(format_phone_fr("+33612345678"), "+33 6 12 34 56 78");
        assert_eq!(format_phone_fr("+330612345678"), "+33 6 12 34 56 78");
        assert_eq!(format_phone_fr("0033612345678"), "+33 6 12 34 56 78");
        assert_eq!(format_phone_fr("+33"), "+33");
    }

    #[test]
    fn phone_spaced_input_kept() {
        assert_eq!(format_phone_fr("  06  12 34 56 78 "), "06 12 34 56 78");
        assert_eq!(format_phone_fr("+44 20 7946 0958"), "+44 20 7946 0958");
    }

    #[test]
    fn phone_other_numbers_grouped() {
        assert_eq!(format_phone_fr("+442079460958"), "+44 20 79 46 09 58");
        assert_eq!(format_phone_fr("112"), "11 2");
    }

    #[test]
    fn phone_without_digits_kept_as_written() {
        assert_eq!(format_phone_fr("N/A"), "N/A");
        assert_eq!(format_phone_fr("voir-annonce"), "voir-annonce");
        assert_eq!(format_phone_fr("+"), "+");
    }
}
