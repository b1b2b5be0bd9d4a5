// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Schema version detection from raw STEP bytes.

use crate::model::UNKNOWN_SCHEMA;
use memchr::memmem;

/// Version tokens in priority order. Longer tokens come first so that
/// `IFC4X3` is never reported as `IFC4`.
const VERSION_TOKENS: [&str; 6] = ["IFC4X3", "IFC4X2", "IFC4X1", "IFC4", "IFC2X3", "IFC2X2"];

/// Schema families the fallback parser recognises.
const SUPPORTED_SCHEMAS: [&str; 3] = ["IFC2X3", "IFC4", "IFC4X3"];

/// Detect the IFC schema version declared in `data`.
///
/// `FILE_SCHEMA` header lines are examined first; if none of them names a
/// known version every line is scanned. Returns `"Unknown"` when nothing
/// matches.
pub fn detect_schema_version(data: &[u8]) -> &'static str {
    let header_lines = data
        .split(|&b| b == b'\n')
        .filter(|line| contains_ignore_case(line, b"FILE_SCHEMA"));

    if let Some(version) = first_version(header_lines) {
        return version;
    }

    first_version(data.split(|&b| b == b'\n')).unwrap_or(UNKNOWN_SCHEMA)
}

/// Whether `version` names a schema family the fallback parser understands.
pub fn is_supported_schema(version: &str) -> bool {
    SUPPORTED_SCHEMAS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(version))
}

fn first_version<'a>(lines: impl Iterator<Item = &'a [u8]>) -> Option<&'static str> {
    for line in lines {
        let upper = line.to_ascii_uppercase();
        for token in VERSION_TOKENS {
            if memmem::find(&upper, token.as_bytes()).is_some() {
                return Some(token);
            }
        }
    }
    None
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
