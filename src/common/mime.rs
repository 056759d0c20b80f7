//! Static file suffix to `Content-Type` lookup

/// Content type when no suffix of the table matches
pub(crate) const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
/// Content type of a directory's `index.html`
pub(crate) const INDEX_MIME_TYPE: &str = "text/html;charset=UTF-8";
/// Content type of the short error bodies
pub(crate) const ERROR_MIME_TYPE: &str = "text/plain";

const MIME_TYPES: &[(&str, &str)] = &[
    (".xml", "application/xml; charset=utf-8"),
    (".xhtml", "application/xhtml+xml; charset=utf-8"),
    (".html", "text/html; charset=utf-8"),
    (".htm", "text/html; charset=utf-8"),
    (".css", "text/css; charset=utf-8"),
    (".txt", "text/plain; charset=utf-8"),
    (".md", "text/plain; charset=utf-8"),
    (".c", "text/plain; charset=utf-8"),
    (".h", "text/plain; charset=utf-8"),
    (".gz", "application/x-gtar"),
    (".tar", "application/tar"),
    (".pdf", "application/x-pdf"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".jpeg", "image/jpg"),
    (".jpg", "image/jpg"),
    (".iso", "application/x-iso9660-image"),
    (".webp", "image/webp"),
    (".svg", "image/svg+xml; charset=utf-8"),
    (".flac", "audio/flac"),
    (".mp3", "audio/mpeg"),
    (".ogg", "audio/ogg"),
    (".mp4", "video/mp4"),
    (".ogv", "video/ogg"),
    (".webm", "video/webm"),
];

/// Longest matching suffix wins, ties go to the earlier table entry.
pub(crate) fn lookup(path: &[u8]) -> &'static str {
    let mut best: Option<(&str, &'static str)> = None;
    for &(suffix, mime) in MIME_TYPES {
        if !path.ends_with(suffix.as_bytes()) {
            continue;
        }
        if best.map_or(true, |(s, _)| suffix.len() > s.len()) {
            best = Some((suffix, mime));
        }
    }
    best.map_or(DEFAULT_MIME_TYPE, |(_, mime)| mime)
}
