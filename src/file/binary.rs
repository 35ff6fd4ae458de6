use std::path::Path;

/// Bytes inspected when sniffing content
const SNIFF_LEN: usize = 8192;

/// Decide whether a file should be treated as binary.
///
/// `bytes` is the file content already read by the caller. The extension
/// is checked first, then the leading bytes are sniffed for null bytes and
/// a high share of non-printable characters.
pub fn is_binary(path: &Path, bytes: &[u8]) -> bool {
    has_binary_extension(path) || looks_binary(bytes)
}

fn has_binary_extension(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();

    // Minified bundles are text but useless as answer context
    if name.ends_with(".min.js") || name.ends_with(".bundle.js") {
        return true;
    }

    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(
        ext.to_lowercase().as_str(),
        // Executables and libraries
        "exe" | "dll" | "so" | "dylib" | "a" | "o" | "lib" | "bin"
        // Archives
        | "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar" | "tgz"
        // Images
        | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "webp"
        // Audio and video
        | "mp3" | "wav" | "ogg" | "flac" | "mp4" | "avi" | "mov" | "mkv" | "webm"
        // Documents
        | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
        // Compiled artifacts and lock files
        | "wasm" | "pyc" | "class" | "jar" | "lock"
    )
}

fn looks_binary(bytes: &[u8]) -> bool {
    let data = &bytes[..bytes.len().min(SNIFF_LEN)];
    if data.is_empty() {
        return false;
    }

    if data.contains(&0) {
        return true;
    }

    let non_printable = data
        .iter()
        .filter(|&&b| !matches!(b, 0x09 | 0x0A | 0x0D | 0x20..=0x7E))
        .count();
    let ratio = non_printable as f64 / data.len() as f64;

    // Non-ASCII text is fine as long as it decodes; a sniff window may cut
    // a multi-byte character, so only the valid prefix has to decode.
    match std::str::from_utf8(data) {
        Ok(_) => ratio > 0.80,
        Err(e) if e.error_len().is_none() => ratio > 0.80,
        Err(_) => ratio > 0.30,
    }
}
