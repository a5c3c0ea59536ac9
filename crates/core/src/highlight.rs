//! Search match highlighting

use crate::types::MatchSpan;

/// A run of text that is either part of a match or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub matched: bool,
}

impl<'a> Segment<'a> {
    const fn plain(text: &'a str) -> Self {
        Self {
            text,
            matched: false,
        }
    }

    const fn marked(text: &'a str) -> Self {
        Self {
            text,
            matched: true,
        }
    }
}

/// Split `text` into matched and unmatched segments
///
/// Span offsets count characters, not bytes. Spans are applied in order of
/// their start offset; spans reaching past the end of `text` are clamped,
/// overlapping spans are merged and empty spans are dropped. The segments
/// always concatenate back to `text`.
pub fn highlight<'a>(text: &'a str, spans: &[MatchSpan]) -> Vec<Segment<'a>> {
    // Byte offset of every char boundary, including the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut ranges: Vec<(usize, usize)> = spans
        .iter()
        .map(|span| (span.start.min(char_count), span.end.min(char_count)))
        .filter(|(start, end)| start < end)
        .collect();
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut segments = Vec::with_capacity(merged.len() * 2 + 1);
    let mut cursor = 0;
    for (start, end) in merged {
        if cursor < start {
            segments.push(Segment::plain(&text[boundaries[cursor]..boundaries[start]]));
        }
        segments.push(Segment::marked(&text[boundaries[start]..boundaries[end]]));
        cursor = end;
    }
    if cursor < char_count {
        segments.push(Segment::plain(&text[boundaries[cursor]..]));
    }

    segments
}
