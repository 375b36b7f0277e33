//! Splitting long messages into composer-sized chunks.

/// Preferred break points, strongest first.
const BREAKS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits `text` into chunks of at most `limit` characters.
///
/// A chunk ends right after the last paragraph break, newline or space
/// found within the limit, in that order of preference. A break only counts
/// if the content before it is longer than 40% of the limit; otherwise the
/// chunk is cut hard at the limit. The separator stays at the end of the
/// chunk it terminates, so a separator starting exactly at the limit may
/// trail the chunk's content. Concatenating the chunks yields `text`.
///
/// Lengths are counted in `char`s. A zero limit is treated as 1.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() > limit {
        let window_end = byte_offset(rest, limit);
        let cut = find_break(rest, window_end, limit).unwrap_or(window_end);
        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_string());
        rest = tail;
    }
    // A separator taken at the limit can consume the whole remainder.
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Length of a chunk without the separator it ends on.
pub fn content_len(chunk: &str) -> usize {
    BREAKS
        .iter()
        .find_map(|sep| chunk.strip_suffix(sep))
        .unwrap_or(chunk)
        .chars()
        .count()
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(text.len())
}

fn find_break(rest: &str, window_end: usize, limit: usize) -> Option<usize> {
    for sep in BREAKS {
        // Let a separator that begins exactly at the limit still qualify.
        let search_end = (window_end + sep.len()).min(rest.len());
        let window = rest.get(..search_end).unwrap_or(&rest[..window_end]);
        if let Some(pos) = window.rfind(sep) {
            let before = rest[..pos].chars().count();
            if before * 5 > limit * 2 {
                return Some(pos + sep.len());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(text: &str, limit: usize) -> Vec<String> {
        let chunks = split_chunks(text, limit);
        assert_eq!(chunks.concat(), text, "chunks must reconstruct the input");
        for chunk in &chunks {
            assert!(content_len(chunk) <= limit, "chunk {:?} exceeds {}", chunk, limit);
            assert!(!chunk.is_empty() || chunks.len() == 1);
        }
        chunks
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_chunks("hello", 10), vec!["hello"]);
        assert_eq!(split_chunks("exactly10!", 10), vec!["exactly10!"]);
        assert_eq!(split_chunks("", 10), vec![""]);
    }

    #[test]
    fn test_space_boundary_at_limit() {
        assert_eq!(split_chunks("abcdefghij klmnop", 10), vec!["abcdefghij ", "klmnop"]);
    }

    #[test]
    fn test_trailing_separator_at_limit_leaves_no_empty_chunk() {
        assert_eq!(assert_round_trip("abcdefghij ", 10), vec!["abcdefghij "]);
        assert_eq!(assert_round_trip("abcdefghij\n\n", 10), vec!["abcdefghij\n\n"]);
        assert_eq!(assert_round_trip("abcdefghij\n", 10), vec!["abcdefghij\n"]);
        let chunks = assert_round_trip("abcdefghij klmnopqrst ", 10);
        assert_eq!(chunks, vec!["abcdefghij ", "klmnopqrst "]);
    }

    #[test]
    fn test_paragraph_break_preferred_over_space() {
        let text = "one two three\n\nfour five six seven";
        let chunks = assert_round_trip(text, 20);
        assert_eq!(chunks[0], "one two three\n\n");
    }

    #[test]
    fn test_newline_preferred_over_space() {
        let text = "alpha beta\ngamma delta epsilon";
        let chunks = assert_round_trip(text, 16);
        assert_eq!(chunks[0], "alpha beta\n");
    }

    #[test]
    fn test_break_too_early_falls_back_to_hard_cut() {
        // The only space sits at 20% of the limit, so the cut is hard.
        let text = "ab cdefghijklmnopqrstuvwxyz";
        let chunks = assert_round_trip(text, 10);
        assert_eq!(chunks[0], "ab cdefghi");
        assert_eq!(chunks[0].chars().count(), 10);
    }

    #[test]
    fn test_no_break_points_hard_cuts() {
        let text = "x".repeat(25);
        let chunks = assert_round_trip(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "xxxxx");
    }

    #[test]
    fn test_multibyte_text_is_never_split_inside_a_char() {
        let text = "ünïcödé wörds ärè fïnë ".repeat(30);
        assert_round_trip(&text, 17);
        let emoji = "😀".repeat(33);
        let chunks = assert_round_trip(&emoji, 10);
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_long_prose_round_trips_for_many_limits() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit.\n\
                    Sed do eiusmod tempor incididunt ut labore.\n\n\
                    Ut enim ad minim veniam, quis nostrud exercitation ullamco.";
        for limit in [1, 2, 5, 13, 40, 64, 200] {
            assert_round_trip(text, limit);
        }
    }

    #[test]
    fn test_zero_limit_does_not_loop() {
        assert_eq!(split_chunks("abc", 0), vec!["a", "b", "c"]);
    }
}
