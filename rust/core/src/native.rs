// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Native fallback parser.
//!
//! Coarse entity counting and basic structural validation used when the
//! remote parsing service is disabled, unavailable, or tripped. Counts are
//! case-insensitive keyword occurrence counts: fast and approximate, with no
//! attempt to parse argument lists.

use crate::error::{Error, Result};
use crate::model::{
    ComplianceFlags, EntityCounts, EntityRecord, Metadata, ParseResult, ValidationIssues,
    ValidationResult,
};
use crate::scanner::{first_string_argument, EntityScanner};
use crate::schema::{detect_schema_version, is_supported_schema};
use memchr::memmem;
use std::time::Instant;

/// STEP header token.
pub const STEP_HEADER: &str = "ISO-10303-21";
/// STEP footer token.
pub const STEP_FOOTER: &str = "END-ISO-10303-21";
/// Project-root entity marker.
pub const PROJECT_MARKER: &str = "IFCPROJECT";

/// Entity family keywords counted by the fallback parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFamily {
    Building,
    Space,
    Equipment,
    Wall,
    Door,
    Window,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 6] = [
        EntityFamily::Building,
        EntityFamily::Space,
        EntityFamily::Equipment,
        EntityFamily::Wall,
        EntityFamily::Door,
        EntityFamily::Window,
    ];

    /// Upper-case keyword matched against the input.
    pub fn keyword(self) -> &'static str {
        match self {
            EntityFamily::Building => "IFCBUILDING",
            EntityFamily::Space => "IFCSPACE",
            EntityFamily::Equipment => "IFCFLOWTERMINAL",
            EntityFamily::Wall => "IFCWALL",
            EntityFamily::Door => "IFCDOOR",
            EntityFamily::Window => "IFCWINDOW",
        }
    }

    fn slot(self, counts: &mut EntityCounts) -> &mut usize {
        match self {
            EntityFamily::Building => &mut counts.buildings,
            EntityFamily::Space => &mut counts.spaces,
            EntityFamily::Equipment => &mut counts.equipment,
            EntityFamily::Wall => &mut counts.walls,
            EntityFamily::Door => &mut counts.doors,
            EntityFamily::Window => &mut counts.windows,
        }
    }

    /// Family an exact entity type name belongs to, using the same
    /// prefix rule as the keyword count.
    fn of_type(type_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|family| type_name.starts_with(family.keyword()))
    }
}

/// Presence of the three structural markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Envelope {
    header: bool,
    footer: bool,
    project: bool,
}

impl Envelope {
    fn inspect(upper: &[u8]) -> Self {
        // Every footer also contains the header token.
        let headers = memmem::find_iter(upper, STEP_HEADER.as_bytes()).count();
        let footers = memmem::find_iter(upper, STEP_FOOTER.as_bytes()).count();
        Self {
            header: headers > footers,
            footer: footers > 0,
            project: memmem::find(upper, PROJECT_MARKER.as_bytes()).is_some(),
        }
    }

    fn is_complete(&self) -> bool {
        self.header && self.footer && self.project
    }

    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.header {
            missing.push("STEP header (ISO-10303-21)");
        }
        if !self.footer {
            missing.push("STEP footer (END-ISO-10303-21)");
        }
        if !self.project {
            missing.push("IFCPROJECT entity");
        }
        missing
    }
}

/// Dependency-free IFC parser used as the fallback path.
#[derive(Debug, Clone)]
pub struct NativeParser {
    max_file_size: u64,
}

impl NativeParser {
    /// Create a parser that rejects inputs larger than `max_file_size` bytes.
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Parse `data`, failing on oversized input or a missing STEP envelope.
    pub fn parse_ifc(&self, data: &[u8]) -> Result<ParseResult> {
        let started = Instant::now();
        self.check_size(data)?;

        let upper = data.to_ascii_uppercase();
        let envelope = Envelope::inspect(&upper);
        if !envelope.is_complete() {
            return Err(Error::InvalidFormat {
                missing: envelope.missing(),
            });
        }

        let counts = count_entities(&upper);
        let entities = collect_records(data);
        let metadata = Metadata::new(
            detect_schema_version(data),
            data.len() as u64,
            started.elapsed(),
        );

        Ok(ParseResult::from_counts(counts, entities, metadata))
    }

    /// Validate `data`.
    ///
    /// Only the size limit is fatal; structural problems are reported as
    /// errors inside a successful result with `valid == false`.
    pub fn validate_ifc(&self, data: &[u8]) -> Result<ValidationResult> {
        let started = Instant::now();
        self.check_size(data)?;

        let upper = data.to_ascii_uppercase();
        let envelope = Envelope::inspect(&upper);
        let counts = count_entities(&upper);
        let version = detect_schema_version(data);

        let mut issues = ValidationIssues::default();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        for missing in envelope.missing() {
            let message = format!("Missing {}", missing);
            issues.integrity.push(message.clone());
            errors.push(message);
        }

        if counts.buildings == 0 {
            let message = "No IFCBUILDING entities found".to_string();
            issues.spatial.push(message.clone());
            warnings.push(message);
        }
        if counts.spaces == 0 {
            let message = "No IFCSPACE entities found".to_string();
            issues.spatial.push(message.clone());
            warnings.push(message);
        }
        if !is_supported_schema(version) {
            let message = format!("Unrecognized IFC schema version: {}", version);
            issues.schema.push(message.clone());
            warnings.push(message);
        }

        let compliance = ComplianceFlags {
            schema_family_match: is_supported_schema(version),
            spatial_consistency: counts.buildings > 0 && counts.spaces > 0,
            data_integrity: envelope.is_complete() && counts.total() > 0,
        };

        let metadata = Metadata::new(version, data.len() as u64, started.elapsed());
        let issues = (!issues.is_empty()).then_some(issues);

        Ok(ValidationResult::from_findings(
            warnings, errors, compliance, metadata, issues,
        ))
    }

    fn check_size(&self, data: &[u8]) -> Result<()> {
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(Error::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// Keyword occurrence count per family over upper-cased input.
fn count_entities(upper: &[u8]) -> EntityCounts {
    let mut counts = EntityCounts::default();
    for family in EntityFamily::ALL {
        *family.slot(&mut counts) = memmem::find_iter(upper, family.keyword().as_bytes()).count();
    }
    counts
}

/// Entity records belonging to the counted families.
fn collect_records(data: &[u8]) -> Vec<EntityRecord> {
    let mut scanner = EntityScanner::new(data);
    let mut records = Vec::new();
    while let Some(record) = scanner.next_entity() {
        let ifc_type = record.type_str();
        if EntityFamily::of_type(&ifc_type).is_some() {
            records.push(EntityRecord {
                id: record.id,
                ifc_type,
                global_id: first_string_argument(&data[record.start..record.end]),
            });
        }
    }
    records
}
