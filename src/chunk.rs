//! Overlapping text chunker.
//!
//! Splits extracted document text into segments of at most `chunk_size`
//! characters, with `overlap` characters shared between consecutive
//! segments. Cut points prefer natural boundaries (paragraph break,
//! sentence end, line break, word gap) before falling back to a hard
//! character cut.
//!
//! Chunks are raw slices of the input: concatenating the first chunk with
//! every subsequent chunk minus its leading overlap reconstructs the input
//! exactly.

/// Split `text` into overlapping chunks. Deterministic and pure.
///
/// Empty or whitespace-only input yields no chunks; input that fits in a
/// single chunk is returned whole. Sizes are in characters, and cuts always
/// land on `char` boundaries.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every char, so windows can be computed in characters.
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let n = offsets.len();
    if n <= chunk_size {
        return vec![text.to_string()];
    }

    let byte_at = |ci: usize| {
        if ci >= n {
            text.len()
        } else {
            offsets[ci]
        }
    };

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(n);
        let cut = if end == n {
            n
        } else {
            boundary_cut(text, &offsets, start, end, chunk_size, overlap)
        };
        chunks.push(text[byte_at(start)..byte_at(cut)].to_string());
        if cut == n {
            break;
        }
        start = cut - overlap;
    }
    chunks
}

/// Find the best cut point (as a char index) inside one chunk window.
///
/// Only the second half of the window is searched, which also guarantees
/// the next chunk's start advances past the current one.
fn boundary_cut(
    text: &str,
    offsets: &[usize],
    start: usize,
    end: usize,
    chunk_size: usize,
    overlap: usize,
) -> usize {
    let n = offsets.len();
    let byte_at = |ci: usize| {
        if ci >= n {
            text.len()
        } else {
            offsets[ci]
        }
    };

    let win_start = start + (chunk_size / 2).max(overlap + 1);
    if win_start >= end {
        return end;
    }

    let window = &text[byte_at(win_start)..byte_at(end)];
    let rel = window
        .rfind("\n\n")
        .map(|p| p + 2)
        .or_else(|| rfind_any(window, &[". ", "! ", "? "]).map(|p| p + 2))
        .or_else(|| window.rfind('\n').map(|p| p + 1))
        .or_else(|| window.rfind(' ').map(|p| p + 1));

    match rel {
        Some(r) => {
            let byte = byte_at(win_start) + r;
            if byte == text.len() {
                n
            } else {
                // The cut lands after an ASCII separator, so it is a valid
                // char boundary present in the offset table.
                offsets.partition_point(|&o| o < byte)
            }
        }
        None => end,
    }
}

fn rfind_any(haystack: &str, needles: &[&str]) -> Option<usize> {
    needles.iter().filter_map(|nd| haystack.rfind(nd)).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text("   \n\n  ", 1000, 200).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("Halo desa.", 1000, 200);
        assert_eq!(chunks, vec!["Halo desa.".to_string()]);
    }

    #[test]
    fn chunks_respect_max_size() {
        let text = "kata ".repeat(600);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 100, "chunk too long: {}", c.len());
        }
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let text = "abcdefghij ".repeat(200);
        let overlap = 20;
        let chunks = split_text(&text, 100, overlap);
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count() - overlap)
                .collect();
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn concatenation_reconstructs_input() {
        let text = "Paragraf satu tentang desa.\n\nParagraf dua tentang peraturan. Kalimat lagi di sini.\n\nParagraf tiga.\n".repeat(30);
        let overlap = 50;
        let chunks = split_text(&text, 300, overlap);
        let mut rebuilt = chunks[0].clone();
        for c in &chunks[1..] {
            let skip_bytes: usize = c.chars().take(overlap).map(|ch| ch.len_utf8()).sum();
            rebuilt.push_str(&c[skip_bytes..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn prefers_paragraph_boundary() {
        let para = format!("{}\n\n{}", "a".repeat(80), "b".repeat(200));
        let chunks = split_text(&para, 100, 10);
        assert!(chunks[0].ends_with("\n\n"), "first chunk: {:?}", chunks[0]);
    }

    #[test]
    fn prefers_sentence_over_word_boundary() {
        let text = format!("Kalimat pertama cukup panjang sekali. {}", "kata ".repeat(50));
        let chunks = split_text(&text, 60, 10);
        assert!(chunks[0].ends_with(". "), "first chunk: {:?}", chunks[0]);
    }

    #[test]
    fn hard_cut_without_any_boundary() {
        let text = "x".repeat(250);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].len(), 100);
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        let text = "désa désa ü—ü ".repeat(100);
        let chunks = split_text(&text, 50, 10);
        assert!(!chunks.is_empty());
        let rebuilt: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(rebuilt >= text.chars().count());
    }

    #[test]
    fn deterministic() {
        let text = "Data desa. ".repeat(500);
        assert_eq!(split_text(&text, 120, 30), split_text(&text, 120, 30));
    }
}
