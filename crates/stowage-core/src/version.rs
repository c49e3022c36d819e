//! Monotonic image version tags (`v<N>`).

use serde::{Deserialize, Serialize};

use crate::error::{Result, StowageError};

/// An image version tag of the form `v<N>`, `N >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageVersion(u64);

impl ImageVersion {
    pub const FIRST: ImageVersion = ImageVersion(1);

    pub fn number(&self) -> u64 {
        self.0
    }

    /// Parse a `v<digits>` tag. Anything else (including `latest`, `v`,
    /// `v1.2`, `1`) is not a version tag.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let digits = tag.strip_prefix('v')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(ImageVersion)
    }

    /// The following version, or `None` past the largest representable one.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(ImageVersion)
    }

    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Compute the next version from the tags already present for an image.
///
/// Fails when the highest existing tag has no successor; the result is
/// always strictly greater than every existing version tag.
///
/// Not safe against two runs resolving concurrently: both may pick the same
/// tag.
pub fn next_version<I, S>(existing_tags: I) -> Result<ImageVersion>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let highest = existing_tags
        .into_iter()
        .filter_map(|tag| ImageVersion::parse_tag(tag.as_ref().trim()))
        .max();
    match highest {
        None => Ok(ImageVersion::FIRST),
        Some(v) => v
            .next()
            .ok_or_else(|| StowageError::VersionExhausted(v.tag())),
    }
}
