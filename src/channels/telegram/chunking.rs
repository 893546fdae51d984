//! Splitting of long replies to fit Telegram's message size cap
//!
//! Telegram rejects messages over 4096 characters. Text is split on
//! paragraph boundaries first, then sentences and line breaks, and only an
//! overlong run without any of those is cut at whitespace or mid-word.

/// Chunk size in bytes; a byte count never undercounts Telegram's limit
pub const MESSAGE_LIMIT: usize = 4000;

/// Split `text` into non-empty chunks of at most `limit` bytes, in order
///
/// Returns an empty vector for blank text.
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    pack(text.split("\n\n"), "\n\n", limit, split_sentences)
}

fn split_sentences(text: &str, limit: usize) -> Vec<String> {
    pack(sentences(text), "", limit, split_hard)
}

/// Cut at the last whitespace before `limit`, or at `limit` itself
fn split_hard(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.len() <= limit {
            chunks.push(rest.to_string());
            break;
        }

        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // Limit smaller than one character: emit it alone
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        } else if let Some(ws) = rest[..cut].rfind(char::is_whitespace)
            && ws > 0
        {
            cut = ws;
        }

        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}

/// Sentence-sized pieces, each keeping its punctuation and trailing space
fn sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        let end = match b {
            b'\n' => i + 1,
            // "1. " starts a list item rather than ending a sentence
            b'.' if i > 0 && bytes[i - 1].is_ascii_digit() => continue,
            b'.' | b'!' | b'?' if bytes.get(i + 1) == Some(&b' ') => i + 2,
            _ => continue,
        };
        if end > start {
            pieces.push(&text[start..end]);
            start = end;
        }
    }
    pieces.push(&text[start..]);

    pieces
}

/// Greedily join `pieces` with `joiner` into chunks of at most `limit` bytes
///
/// A piece that alone exceeds the limit is handed to `oversized`.
fn pack<'a>(
    pieces: impl IntoIterator<Item = &'a str>,
    joiner: &str,
    limit: usize,
    oversized: fn(&str, usize) -> Vec<String>,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if piece.trim().is_empty() {
            continue;
        }

        if piece.len() > limit {
            flush(&mut chunks, &mut current);
            chunks.extend(oversized(piece, limit));
            continue;
        }

        let joined = if current.is_empty() {
            piece.len()
        } else {
            current.len() + joiner.len() + piece.len()
        };
        if joined > limit {
            flush(&mut chunks, &mut current);
        }

        if !current.is_empty() {
            current.push_str(joiner);
        }
        current.push_str(piece);
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = current.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_fits(chunks: &[String], limit: usize) {
        assert!(!chunks.is_empty());
        for chunk in chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.len() <= limit, "{} bytes: {chunk:?}", chunk.len());
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("  Paris.  ", MESSAGE_LIMIT), vec!["Paris."]);
        assert!(split_message(" \n ", MESSAGE_LIMIT).is_empty());
    }

    #[test]
    fn keeps_paragraphs_together() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split_message(text, 36);

        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph.", "Third paragraph."]);
    }

    #[test]
    fn long_paragraph_falls_back_to_sentences() {
        let text = "Hello world. This is a test. Another sentence here. And one more.";
        let chunks = split_message(text, 30);

        assert_fits(&chunks, 30);
        assert_eq!(chunks[0], "Hello world. This is a test.");
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn list_lines_keep_their_breaks() {
        let text = "Steps:\n1. Open the app\n2. Tap settings\n3. Pick a voice";
        let chunks = split_message(text, 32);

        assert_eq!(chunks, vec!["Steps:\n1. Open the app", "2. Tap settings\n3. Pick a voice"]);
    }

    #[test]
    fn unbroken_text_is_cut_at_whitespace_or_limit() {
        let chunks = split_message("abcdefghij", 3);
        assert_eq!(chunks, vec!["abc", "def", "ghi", "j"]);

        let chunks = split_message("lorem ipsumdolor sit", 12);
        assert_eq!(chunks, vec!["lorem", "ipsumdolor", "sit"]);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "\u{1F600}".repeat(5);
        let chunks = split_message(&text, 9);

        assert_fits(&chunks, 9);
        assert_eq!(chunks.concat(), text);

        // Limit below one character still makes progress
        assert_eq!(split_message("\u{1F600}\u{1F601}", 2).len(), 2);
    }

    #[test]
    fn long_reply_fits_telegram() {
        let sentence = "The forecast calls for light rain in the afternoon. ";
        let text = sentence.repeat(200);

        let chunks = split_message(&text, MESSAGE_LIMIT);

        assert!(chunks.len() > 1);
        assert_fits(&chunks, MESSAGE_LIMIT);
        assert!(chunks.iter().all(|c| c.ends_with('.')));
    }
}
