use crate::errors::{Error, Result};

/// Mode of a tree entry
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub enum FileMode {
    #[default]
    Blob,
    Executable,
    Symlink,
    Submodule,
    Tree,
}

/// Entries whose modes share a class can be diffed as modifications;
/// crossing classes is a type change.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModeClass {
    Regular,
    Symlink,
    Submodule,
    Tree,
}

impl FileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Blob => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Submodule => "160000",
            FileMode::Tree => "40000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            FileMode::Blob => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Symlink => 0o120000,
            FileMode::Submodule => 0o160000,
            FileMode::Tree => 0o40000,
        }
    }

    pub fn class(&self) -> ModeClass {
        match self {
            FileMode::Blob | FileMode::Executable => ModeClass::Regular,
            FileMode::Symlink => ModeClass::Symlink,
            FileMode::Submodule => ModeClass::Submodule,
            FileMode::Tree => ModeClass::Tree,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, FileMode::Tree)
    }

    /// Whether the entry's id names content in this repository's store
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            FileMode::Blob | FileMode::Executable | FileMode::Symlink
        )
    }

    /// Parse the octal form found in tree entries (`100644`, `40000`, ...)
    pub fn from_octal_str(mode: &str) -> Result<Self> {
        let value = u32::from_str_radix(mode, 8)
            .map_err(|_| Error::corrupt(format!("invalid entry mode '{mode}'")))?;

        Self::try_from(value)
    }
}

impl TryFrom<u32> for FileMode {
    type Error = Error;

    fn try_from(mode: u32) -> Result<Self> {
        match mode {
            0o100644 | 0o100664 => Ok(FileMode::Blob),
            0o100755 => Ok(FileMode::Executable),
            0o120000 => Ok(FileMode::Symlink),
            0o160000 => Ok(FileMode::Submodule),
            0o40000 => Ok(FileMode::Tree),
            other => Err(Error::corrupt(format!("invalid entry mode {other:o}"))),
        }
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100644", FileMode::Blob)]
    #[case("100755", FileMode::Executable)]
    #[case("120000", FileMode::Symlink)]
    #[case("160000", FileMode::Submodule)]
    #[case("40000", FileMode::Tree)]
    fn parses_octal_modes(#[case] raw: &str, #[case] expected: FileMode) {
        let mode = FileMode::from_octal_str(raw).unwrap();

        pretty_assertions::assert_eq!(mode, expected);
        pretty_assertions::assert_eq!(mode.as_str(), raw);
    }

    #[test]
    fn executable_and_regular_blobs_share_a_class() {
        assert_eq!(FileMode::Blob.class(), FileMode::Executable.class());
        assert_ne!(FileMode::Blob.class(), FileMode::Symlink.class());
    }
}
