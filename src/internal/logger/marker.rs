// src/internal/logger/marker.rs

/// Width of a section marker line.
pub const MARKER_LEN: usize = 80;

/// Centers `text` in a rule of `mark` characters, e.g.
/// `------------- test_start -------------`.
///
/// Text too long to fit a leading and trailing space is returned as is.
pub fn format_marker(text: &str, mark: char) -> String {
    let len = text.chars().count();
    if len >= MARKER_LEN - 2 {
        return text.to_string();
    }

    let padded = format!(" {} ", text);
    let fill = MARKER_LEN - (len + 2);
    let left = fill / 2;
    let right = fill - left;

    let mut out = String::with_capacity(MARKER_LEN + text.len());
    out.extend(std::iter::repeat(mark).take(left));
    out.push_str(&padded);
    out.extend(std::iter::repeat(mark).take(right));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_fixed_width_and_centered() {
        for text in ["a", "test_start", "odd", &"x".repeat(77)] {
            let marker = format_marker(text, '-');
            assert_eq!(marker.chars().count(), MARKER_LEN, "width for {:?}", text);
            assert!(marker.contains(&format!(" {} ", text)));

            let left = marker.chars().take_while(|c| *c == '-').count();
            let right = marker.chars().rev().take_while(|c| *c == '-').count();
            assert!(right == left || right == left + 1);
        }
    }

    #[test]
    fn test_marker_custom_mark() {
        let marker = format_marker("setup", '=');
        assert!(marker.starts_with("==="));
        assert!(marker.ends_with("==="));
    }

    #[test]
    fn test_long_text_is_unchanged() {
        let long = "y".repeat(MARKER_LEN - 2);
        assert_eq!(format_marker(&long, '-'), long);
        let longer = "z".repeat(200);
        assert_eq!(format_marker(&longer, '-'), longer);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let marker = format_marker("héllo", '*');
        assert_eq!(marker.chars().count(), MARKER_LEN);
    }
}
