use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

/// A whitespace-delimited word and its byte span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

pub(crate) fn tokenize(text: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Convert a byte offset into a char offset.
pub(crate) fn char_offset(text: &str, byte_pos: usize) -> usize {
    let byte_pos = snap_to_char_boundary(text, byte_pos, false);
    text[..byte_pos].chars().count()
}

/// Up to `width` chars of `text` centred on the byte span `start..end`,
/// with `...` marking each truncated side.
pub(crate) fn context_around(text: &str, start: usize, end: usize, width: usize) -> String {
    let mid = snap_to_char_boundary(text, (start + end) / 2, false);
    let half = width / 2;

    let ctx_start = if half == 0 {
        mid
    } else {
        text[..mid]
            .char_indices()
            .rev()
            .nth(half - 1)
            .map_or(0, |(i, _)| i)
    };
    let ctx_end = text[mid..]
        .char_indices()
        .nth(half)
        .map_or(text.len(), |(i, _)| mid + i);

    let snippet = text[ctx_start..ctx_end].replace('\n', " ");
    let prefix = if ctx_start > 0 { "..." } else { "" };
    let suffix = if ctx_end < text.len() { "..." } else { "" };
    format!("{prefix}{snippet}{suffix}")
}

/// Snap a byte offset to a valid char boundary.
/// If `forward` is true, snap forward; otherwise snap backward.
pub(crate) fn snap_to_char_boundary(text: &str, pos: usize, forward: bool) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    if forward {
        while p < text.len() && !text.is_char_boundary(p) {
            p += 1;
        }
    } else {
        while p > 0 && !text.is_char_boundary(p) {
            p -= 1;
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_tracks_byte_spans() {
        let text = "אני  רוצה\nללכת";
        let tokens = tokenize(text);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "רוצה");
        assert_eq!(&text[tokens[1].start..tokens[1].end], "רוצה");
    }

    #[test]
    fn char_offset_counts_hebrew_letters_once() {
        let text = "על מנת";
        let byte_pos = text.find("מנת").unwrap();
        assert_eq!(char_offset(text, byte_pos), 3);
        assert_eq!(char_offset(text, text.len()), 6);
    }

    #[test]
    fn snapping_never_splits_a_char() {
        let text = "שלום";
        // Every Hebrew letter is two bytes in UTF-8.
        assert_eq!(snap_to_char_boundary(text, 1, false), 0);
        assert_eq!(snap_to_char_boundary(text, 1, true), 2);
        assert_eq!(snap_to_char_boundary(text, 100, true), text.len());
    }

    #[test]
    fn context_is_marked_when_truncated() {
        let text = "אחת שתיים שלוש ארבע חמש שש שבע שמונה תשע עשר";
        let start = text.find("חמש").unwrap();
        let ctx = context_around(text, start, start + "חמש".len(), 12);
        assert!(ctx.starts_with("..."));
        assert!(ctx.ends_with("..."));
        assert!(ctx.contains("חמש"));
    }

    #[test]
    fn context_width_counts_chars_not_bytes() {
        let text = "א".repeat(100);
        let start = "א".len() * 50;
        let ctx = context_around(&text, start, start + "א".len(), 10);
        assert_eq!(ctx, format!("...{}...", "א".repeat(10)));

        let short = "על מנת";
        assert_eq!(context_around(short, 0, short.len(), 60), short);
    }
}
