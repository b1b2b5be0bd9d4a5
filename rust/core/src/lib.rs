// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC Ingest Core
//!
//! Network-free building blocks of the IFC ingestion layer:
//!
//! - **Result model**: [`ParseResult`], [`ValidationResult`] and [`Metadata`],
//!   produced identically by the remote and native parsing paths
//! - **Native parser**: [`NativeParser`], a coarse fallback that checks the STEP
//!   envelope, counts entity families and detects the schema version
//! - **Record scanner**: [`EntityScanner`], a byte-level walk over
//!   `#<id>=<TYPE>(...);` records
//!
//! ## Quick Start
//!
//! ```rust
//! use ifc_ingest_core::NativeParser;
//!
//! let data = b"ISO-10303-21;\nFILE_SCHEMA(('IFC4'));\n#1=IFCPROJECT('p',$);\n#2=IFCBUILDING('b',$);\nEND-ISO-10303-21;";
//! let result = NativeParser::new(1024).parse_ifc(data).unwrap();
//! assert_eq!(result.counts.buildings, 1);
//! assert_eq!(result.metadata.schema_version, "IFC4");
//! ```

pub mod error;
pub mod model;
pub mod native;
pub mod scanner;
pub mod schema;

pub use error::{Error, Result};
pub use model::{
    ComplianceFlags, EntityCounts, EntityRecord, ErrorDetail, Metadata, ParseResult,
    ValidationIssues, ValidationResult, UNKNOWN_SCHEMA,
};
pub use native::{EntityFamily, NativeParser};
pub use scanner::{EntityScanner, RawRecord};
pub use schema::{detect_schema_version, is_supported_schema};
