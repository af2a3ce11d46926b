//! Line-based text persistence primitives, grounded on `napp_optim.cc`'s
//! `WriteField`/`ReadField`/`MergeIntoStr`/`SplitStr` helpers: every header
//! field is one `key = value` line, every list is one line of
//! space-separated values. Used by [`crate::napp::index::NappIndex`]'s save
//! and load; HNSW keeps its own binary header format in `hnsw::graph`.

use crate::error::AnnError;
use std::fmt::Display;
use std::str::FromStr;

/// Appends a `key = value` line to `out`.
pub fn write_field(out: &mut String, key: &str, value: impl Display) {
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(&value.to_string());
    out.push('\n');
}

/// Appends a line of space-separated values to `out`.
pub fn write_list<T: Display>(out: &mut String, values: impl IntoIterator<Item = T>) {
    let line = values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
    out.push_str(&line);
    out.push('\n');
}

/// Reads the next line from `lines` and parses it as a `key = value` pair,
/// checking the key matches `expected_key`.
pub fn read_field<T: FromStr>(
    lines: &mut std::str::Lines<'_>,
    expected_key: &str,
) -> Result<T, AnnError> {
    let line = lines
        .next()
        .ok_or_else(|| AnnError::Corruption(format!("expected field '{expected_key}', got EOF")))?;

    let (key, value) = line.split_once('=').ok_or_else(|| {
        AnnError::Corruption(format!("malformed field line (expected 'key = value'): {line}"))
    })?;

    if key.trim() != expected_key {
        return Err(AnnError::Corruption(format!(
            "expected field '{expected_key}', found '{}'",
            key.trim()
        )));
    }

    value.trim().parse().map_err(|_| {
        AnnError::Corruption(format!("failed to parse value for field '{expected_key}': {value}"))
    })
}

/// Reads the next line from `lines` as a space-separated list of `T`.
pub fn read_list<T: FromStr>(lines: &mut std::str::Lines<'_>) -> Result<Vec<T>, AnnError> {
    let line = lines.next().ok_or_else(|| AnnError::Corruption("expected a list line, got EOF".into()))?;

    if line.is_empty() {
        return Ok(Vec::new());
    }

    line.split_whitespace()
        .map(|tok| tok.parse().map_err(|_| AnnError::Corruption(format!("failed to parse list entry: {tok}"))))
        .collect()
}
