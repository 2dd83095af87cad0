use crate::core_api::{CoreError, CoreErrorCode};

/// Offset of the first occurrence of `needle` in `haystack`.
///
/// An empty needle is never found.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub fn null_terminated(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    out
}

/// Insert `bytes` at `offset`, shifting everything after it.
pub fn splice_at(buffer: &mut Vec<u8>, offset: usize, bytes: &[u8]) -> Result<(), CoreError> {
    if offset > buffer.len() {
        return Err(CoreError::new(
            CoreErrorCode::Parse,
            format!(
                "insertion offset {offset} is past the end of a {} byte buffer",
                buffer.len()
            ),
        ));
    }
    buffer.splice(offset..offset, bytes.iter().copied());
    Ok(())
}
