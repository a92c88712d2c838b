//! Adapter version compatibility.
//!
//! An extension is accepted when its declared version has the same major as
//! the server's. For `0.x` versions the minor must match as well.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use semver::Version;

use crate::error::{Error, Result};

// ============================================================================
// AdapterVersion
// ============================================================================

/// Version the server announces and checks handshakes against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterVersion(Version);

impl AdapterVersion {
    /// Parses a configured version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `value` is not a semantic version.
    pub fn parse(value: &str) -> Result<Self> {
        Version::parse(value.trim())
            .map(Self)
            .map_err(|e| Error::config(format!("invalid adapter version {value:?}: {e}")))
    }

    /// Checks a version declared by an extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolVersion`] if `declared` is unparseable or
    /// incompatible.
    pub fn check(&self, declared: &str) -> Result<()> {
        let mismatch = || Error::protocol_version(self.to_string(), declared);

        let declared = Version::parse(declared.trim()).map_err(|_| mismatch())?;
        if self.is_compatible(&declared) {
            Ok(())
        } else {
            Err(mismatch())
        }
    }

    /// Returns `true` if `other` may talk to this server.
    #[must_use]
    pub fn is_compatible(&self, other: &Version) -> bool {
        let ours = &self.0;
        if ours.major != other.major {
            return false;
        }
        ours.major != 0 || ours.minor == other.minor
    }

    /// Returns the parsed version.
    #[inline]
    #[must_use]
    pub fn as_semver(&self) -> &Version {
        &self.0
    }
}

impl fmt::Display for AdapterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Tests
// ============================================================================
