//! LaTeX comment stripping

use std::borrow::Cow;

/// Remove the comment from a single line of LaTeX source.
///
/// The first `%` not immediately preceded by a backslash starts the comment; it and
/// everything after it up to the line terminator are dropped. `\%` is kept as-is and
/// a trailing `\n` or `\r\n` survives. Lines without a comment are borrowed.
pub fn strip_comment(line: &str) -> Cow<'_, str> {
    match strip_comment_bytes(line.as_bytes()) {
        Cow::Borrowed(_) => Cow::Borrowed(line),
        // Only whole ASCII runs are removed, so the rest is still UTF-8.
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// [`strip_comment`] over raw bytes, for lines in any ASCII-compatible encoding.
pub fn strip_comment_bytes(line: &[u8]) -> Cow<'_, [u8]> {
    let (body, terminator) = split_terminator_bytes(line);
    match find_comment_start(body) {
        Some(idx) => Cow::Owned([&body[..idx], terminator].concat()),
        None => Cow::Borrowed(line),
    }
}

/// Strip comments from every line of a source file.
///
/// Works on raw bytes so sources in legacy 8-bit encodings pass through untouched
/// apart from their comments. `%`, `\` and `\n` are ASCII in all of them.
pub fn strip_comments(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for line in data.split_inclusive(|&b| b == b'\n') {
        out.extend_from_slice(&strip_comment_bytes(line));
    }
    out
}

fn split_terminator_bytes(line: &[u8]) -> (&[u8], &[u8]) {
    if line.ends_with(b"\r\n") {
        line.split_at(line.len() - 2)
    } else if line.ends_with(b"\n") {
        line.split_at(line.len() - 1)
    } else {
        line.split_at(line.len())
    }
}

fn find_comment_start(body: &[u8]) -> Option<usize> {
    body.iter()
        .enumerate()
        .find(|&(i, &b)| b == b'%' && (i == 0 || body[i - 1] != b'\\'))
        .map(|(i, _)| i)
}
