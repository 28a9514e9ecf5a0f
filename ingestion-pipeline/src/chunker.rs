/// Upper bound on the text stored in a chunk payload. A no-op at the default
/// window size; it caps storage growth if the window is configured larger.
pub const CHUNK_TEXT_LIMIT: usize = 2_000;

/// Splits text into fixed-width windows of at most `max_chars` characters.
///
/// Windows are non-overlapping, in original order, and cover the input
/// exactly: concatenating the returned slices reproduces the text
/// byte-for-byte. The final window may be shorter than `max_chars`. Empty
/// input yields no windows. Splitting is deliberately blind to sentence and
/// paragraph boundaries.
pub fn split_text(text: &str, max_chars: usize) -> Vec<&str> {
    let mut windows = Vec::new();
    if max_chars == 0 {
        return windows;
    }

    let mut remainder = text;
    while !remainder.is_empty() {
        let boundary = remainder
            .char_indices()
            .nth(max_chars)
            .map_or(remainder.len(), |(index, _)| index);
        let (window, rest) = remainder.split_at(boundary);
        windows.push(window);
        remainder = rest;
    }

    windows
}

/// Truncates to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_no_windows() {
        assert!(split_text("", 500).is_empty());
    }

    #[test]
    fn test_1201_chars_split_into_three_windows() {
        let text = "a".repeat(1201);
        let windows = split_text(&text, 500);

        let lengths: Vec<usize> = windows.iter().map(|w| w.len()).collect();
        assert_eq!(lengths, vec![500, 500, 201]);
    }

    #[test]
    fn test_exact_multiple_has_no_short_tail() {
        let text = "b".repeat(1000);
        let windows = split_text(&text, 500);
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.len() == 500));
    }

    #[test]
    fn test_short_input_is_one_window() {
        let windows = split_text("Hello DOCX", 500);
        assert_eq!(windows, vec!["Hello DOCX"]);
    }

    #[test]
    fn test_concatenation_is_lossless() {
        let text = "Återbetalningspolicy gäller i 30 dagar. Kör så det ryker! ÅÄÖ åäö.".repeat(40);
        let windows = split_text(&text, 37);

        assert_eq!(windows.concat(), text);
        assert!(windows.iter().all(|w| w.chars().count() <= 37));
    }

    #[test]
    fn test_multibyte_boundaries_are_respected() {
        let text = "é".repeat(7);
        let windows = split_text(&text, 3);

        let counts: Vec<usize> = windows.iter().map(|w| w.chars().count()).collect();
        assert_eq!(counts, vec![3, 3, 1]);
        assert_eq!(windows.concat(), text);
    }

    #[test]
    fn test_zero_width_produces_nothing() {
        assert!(split_text("anything", 0).is_empty());
    }

    #[test]
    fn test_truncate_chars_is_a_noop_below_bound() {
        assert_eq!(truncate_chars("short", 2_000), "short");
    }

    #[test]
    fn test_truncate_chars_cuts_on_char_boundary() {
        let text = "åå".repeat(3);
        assert_eq!(truncate_chars(&text, 3), "ååå");
    }
}
