use std::fmt;
use std::path::PathBuf;

/// How far dependency versions may move during an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeMode {
    /// Newest minor or patch release of every dependency.
    Full,
    /// Newest patch release only.
    PatchOnly,
}

impl UpgradeMode {
    /// Select the mode from the `minor_version_update` repository setting.
    #[must_use]
    pub fn from_minor_update_allowed(allowed: bool) -> Self {
        if allowed { Self::Full } else { Self::PatchOnly }
    }
}

impl fmt::Display for UpgradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "minor and patch"),
            Self::PatchOnly => write!(f, "patch only"),
        }
    }
}

/// Hex encoded SHA-256 digest of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Manifest content identity before and after one upgrade attempt.
///
/// Content identity is the only change signal: any byte difference counts as
/// a change, reformatting included.
#[derive(Debug, Clone)]
pub struct ManifestState {
    pub path: PathBuf,
    pub before: Fingerprint,
    pub after: Fingerprint,
}

impl ManifestState {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(before: &str, after: &str) -> ManifestState {
        ManifestState {
            path: PathBuf::from("go.mod"),
            before: Fingerprint::new(before),
            after: Fingerprint::new(after),
        }
    }

    #[test]
    fn identical_fingerprints_are_unchanged() {
        assert!(!state("abc", "abc").changed());
    }

    #[test]
    fn different_fingerprints_are_changed() {
        assert!(state("abc", "abd").changed());
    }

    #[test]
    fn mode_follows_minor_update_flag() {
        assert_eq!(UpgradeMode::from_minor_update_allowed(true), UpgradeMode::Full);
        assert_eq!(
            UpgradeMode::from_minor_update_allowed(false),
            UpgradeMode::PatchOnly
        );
    }
}
