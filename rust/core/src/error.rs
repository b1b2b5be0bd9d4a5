// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for native parsing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the native fallback parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("File too large: {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid IFC format: missing {}", missing.join(", "))]
    InvalidFormat { missing: Vec<&'static str> },
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Error::InvalidFormat { .. } => "INVALID_FORMAT",
        }
    }
}
