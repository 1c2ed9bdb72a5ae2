/// How a name inside a table directory is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowName {
    /// Canonical decimal row index, as emitted by directory listings.
    Index(u64),
    /// Anything else. Such a name never exists, it is not a malformed request.
    NotAnIndex,
}

/// Parse a row file name.
///
/// Only the canonical spelling is accepted: ASCII digits, no sign, no leading
/// zeros (except "0" itself). "007" would otherwise alias "7" under a second
/// name.
pub fn parse_row_name(name: &str) -> RowName {
    let bytes = name.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return RowName::NotAnIndex;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return RowName::NotAnIndex;
    }
    match name.parse::<u64>() {
        Ok(index) => RowName::Index(index),
        Err(_) => RowName::NotAnIndex,
    }
}

pub fn row_file_name(index: u64) -> String {
    index.to_string()
}
