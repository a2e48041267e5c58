//! Character-safe string helpers shared by templates, truncation and transports.

/// First `n` characters of `s` (never splits a UTF-8 sequence).
pub fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shorten `s` to at most `max` characters, replacing the tail with `...`.
///
/// `ellipsize("abcdefgh", 5) == "ab..."`.
pub fn ellipsize(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", take_chars(s, max.saturating_sub(3)))
    } else {
        s.to_string()
    }
}

/// Keep the first `max` characters and append `...` when anything was cut.
///
/// Unlike [`ellipsize`] the result may be up to `max + 3` characters long.
pub fn clip(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", take_chars(s, max))
    } else {
        s.to_string()
    }
}

/// Split `s` into consecutive pieces of `size` characters.
pub fn chunk_chars(s: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = s.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Integer with thousands separators: `12345 -> "12,345"`.
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// Like [`format_number`] but renders a missing value as `-`.
pub fn format_opt_number(n: Option<i64>) -> String {
    n.map(format_number).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsize_fits_budget() {
        assert_eq!(ellipsize("short", 40), "short");
        let long = "R V College of Engineering Mysore Road Bengaluru";
        let cut = ellipsize(long, 40);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn clip_appends_after_budget() {
        assert_eq!(clip("abcdef", 3), "abc...");
        assert_eq!(clip("abc", 3), "abc");
    }

    #[test]
    fn multibyte_safe() {
        assert_eq!(take_chars("ಬೆಂಗಳೂರು", 2).chars().count(), 2);
        assert_eq!(chunk_chars("héllo wörld", 4), vec!["héll", "o wö", "rld"]);
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-45000), "-45,000");
        assert_eq!(format_opt_number(None), "-");
    }
}
