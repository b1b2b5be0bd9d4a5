// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast STEP record scanner.
//!
//! Walks `#<id>=<TYPE>(<args>);` records without parsing argument lists.
//! Works on raw bytes so non-UTF-8 input never aborts a scan.

use memchr::memchr;

/// A record located by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub id: u32,
    pub type_name: &'a [u8],
    /// Byte offset of the leading `#`.
    pub start: usize,
    /// Byte offset just past the terminating `;`.
    pub end: usize,
}

impl<'a> RawRecord<'a> {
    /// Type name as text (lossless for well-formed STEP).
    pub fn type_str(&self) -> String {
        String::from_utf8_lossy(self.type_name).to_ascii_uppercase()
    }
}

/// O(n) scanner over STEP entity records.
pub struct EntityScanner<'a> {
    content: &'a [u8],
    position: usize,
}

impl<'a> EntityScanner<'a> {
    pub fn new(content: &'a [u8]) -> Self {
        Self {
            content,
            position: 0,
        }
    }

    /// Scan for the next entity record.
    pub fn next_entity(&mut self) -> Option<RawRecord<'a>> {
        loop {
            let remaining = self.content.get(self.position..)?;
            let start = self.position + memchr(b'#', remaining)?;

            match parse_header(&self.content[start..]) {
                Some((id, type_name)) => match find_terminator(&self.content[start..]) {
                    Ok(terminator) => {
                        let end = start + terminator + 1;
                        self.position = end;
                        return Some(RawRecord {
                            id,
                            type_name,
                            start,
                            end,
                        });
                    }
                    // unterminated record, dropped
                    Err(resume) => self.position = start + resume,
                },
                // `#` inside a header string or a malformed line
                None => self.position = start + 1,
            }
        }
    }
}

/// Extract the first quoted string argument of a record (the GlobalId for
/// rooted IFC entities).
pub fn first_string_argument(record: &[u8]) -> Option<String> {
    let open = memchr(b'(', record)?;
    let args = &record[open + 1..];
    let first = args
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|i| &args[i..])?;
    if first.first() != Some(&b'\'') {
        return None;
    }
    let body = &first[1..];
    let close = memchr(b'\'', body)?;
    let value = String::from_utf8_lossy(&body[..close]).into_owned();
    (!value.is_empty()).then_some(value)
}

/// Position of the `;` closing a record, skipping quoted strings.
///
/// A quoted string that runs into a line starting with `#` is treated as
/// unbalanced: the record has no terminator and `Err` holds the offset of
/// that line. `Err(bytes.len())` when the input ends first.
fn find_terminator(bytes: &[u8]) -> Result<usize, usize> {
    let mut in_string = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b';' if !in_string => return Ok(i),
            b'\n' if in_string && starts_record(&bytes[i + 1..]) => return Err(i + 1),
            _ => {}
        }
    }
    Err(bytes.len())
}

fn starts_record(line: &[u8]) -> bool {
    line.iter().find(|b| !matches!(**b, b' ' | b'\t' | b'\r')) == Some(&b'#')
}

/// Parse `#<id>=<TYPE>` at the start of `line`.
fn parse_header(line: &[u8]) -> Option<(u32, &[u8])> {
    let digits = line[1..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let id = std::str::from_utf8(&line[1..1 + digits]).ok()?.parse::<u32>().ok()?;

    let after_id = &line[1 + digits..];
    let eq = after_id.iter().position(|b| !b.is_ascii_whitespace())?;
    if after_id[eq] != b'=' {
        return None;
    }

    let rest = &after_id[eq + 1..];
    let type_start = rest.iter().position(|b| !b.is_ascii_whitespace())?;
    let rest = &rest[type_start..];
    let type_len = rest
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if type_len == 0 {
        return None;
    }

    Some((id, &rest[..type_len]))
}
