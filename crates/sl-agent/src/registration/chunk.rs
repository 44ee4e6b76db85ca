//! Splitting label lists into request-sized pieces
//!
//! Long label lists in a single query string trip "request header too
//! large" limits on coordinators and proxies, so label mutations are sent
//! in chunks whose space-joined form stays under [`LABEL_CHUNK_LIMIT`].

/// Space-joined label payloads sent in one request stay shorter than this
pub const LABEL_CHUNK_LIMIT: usize = 1000;

/// Split labels into space-joined chunks shorter than `limit` characters.
///
/// Labels are never split; a single label of `limit` or more travels
/// alone in its own chunk.
pub fn chunk_labels<'a, I>(labels: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunks = Vec::new();
    let mut current = String::new();

    for label in labels {
        if label.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + 1 + label.len() >= limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(label);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
