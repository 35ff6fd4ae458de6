//! Line-oriented text splicing
//!
//! Inserts new lines into a block of text at 1-based line numbers. Used to
//! place generated content (doc comments, notes) back into source files.
//! The text keeps its line-break convention: CRLF text stays CRLF.

use crate::error::SpliceError;

/// Pick the separator used to split and rejoin `text`.
///
/// Any CRLF makes the whole text CRLF. In mixed text a bare `\n` is then
/// part of the line it appears in, so line numbers count CRLF breaks only.
fn line_separator(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Split `text` into lines the way the insert functions number them.
///
/// Empty text is one empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split(line_separator(text)).collect()
}

/// Number of lines in `text` as the insert functions count them
pub fn line_count(text: &str) -> usize {
    split_lines(text).len()
}

/// Insert `new_line` so that it becomes line `line_number` of the result.
///
/// Line numbers are 1-based; `line_count + 1` appends after the last line.
pub fn insert_line(text: &str, line_number: usize, new_line: &str) -> Result<String, SpliceError> {
    let sep = line_separator(text);
    let mut lines: Vec<&str> = text.split(sep).collect();
    let line_count = lines.len();

    if line_number < 1 || line_number > line_count + 1 {
        return Err(SpliceError::InvalidLineNumber {
            line: line_number,
            line_count,
        });
    }

    lines.insert(line_number - 1, new_line);
    Ok(lines.join(sep))
}

/// Insert several lines in one pass.
///
/// `indices` are line numbers in the original text and must be ascending
/// (repeats allowed). The i-th insertion lands at `indices[i] + i` in the
/// growing text, so each line ends up before the original line it names.
/// All arguments are validated before anything is inserted.
pub fn insert_many(
    text: &str,
    indices: &[usize],
    new_lines: &[&str],
) -> Result<String, SpliceError> {
    if indices.len() != new_lines.len() {
        return Err(SpliceError::ArgumentMismatch {
            indices: indices.len(),
            lines: new_lines.len(),
        });
    }

    let sep = line_separator(text);
    let mut lines: Vec<&str> = text.split(sep).collect();
    let line_count = lines.len();

    let mut previous = None;
    for &index in indices {
        if index < 1 || index > line_count + 1 {
            return Err(SpliceError::IndexOutOfBounds { index, line_count });
        }
        if let Some(previous) = previous {
            if index < previous {
                return Err(SpliceError::UnorderedIndices { previous, index });
            }
        }
        previous = Some(index);
    }

    lines.reserve(new_lines.len());
    for (offset, (&index, &new_line)) in indices.iter().zip(new_lines).enumerate() {
        lines.insert(index - 1 + offset, new_line);
    }

    Ok(lines.join(sep))
}
