//! The repository's `.git/config`
//!
//! Only what the repository needs is understood: the format version and
//! `extensions.objectformat`. Unknown sections and keys are ignored.

use crate::artifacts::objects::object_id::HashAlgorithm;
use crate::errors::{Error, Result};
use std::path::Path;

const SECTION_REGEX: &str = r"^\[\s*([A-Za-z0-9.-]+)\s*\]$";
const KEY_VALUE_REGEX: &str = r"^([A-Za-z][A-Za-z0-9-]*)\s*=\s*(.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub object_format: HashAlgorithm,
}

impl Config {
    pub fn new(object_format: HashAlgorithm) -> Self {
        Config { object_format }
    }

    /// Read a config file; a missing file means the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let section_re = regex::Regex::new(SECTION_REGEX)
            .map_err(|e| Error::corrupt(format!("invalid config regex: {e}")))?;
        let key_re = regex::Regex::new(KEY_VALUE_REGEX)
            .map_err(|e| Error::corrupt(format!("invalid config regex: {e}")))?;

        let mut config = Config::default();
        let mut section = String::new();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(captures) = section_re.captures(line) {
                section = captures[1].to_ascii_lowercase();
            } else if let Some(captures) = key_re.captures(line) {
                let key = captures[1].to_ascii_lowercase();
                if section == "extensions" && key == "objectformat" {
                    config.object_format = HashAlgorithm::try_from(captures[2].trim())
                        .map_err(|_| {
                            Error::corrupt(format!("unknown object format '{}'", &captures[2]))
                        })?;
                }
            } else {
                return Err(Error::corrupt(format!("malformed config line '{line}'")));
            }
        }

        Ok(config)
    }

    /// Serialized form; SHA-256 repositories need format version 1
    pub fn serialize(&self) -> String {
        match self.object_format {
            HashAlgorithm::Sha1 => "[core]\n\trepositoryformatversion = 0\n".to_string(),
            HashAlgorithm::Sha256 => format!(
                "[core]\n\trepositoryformatversion = 1\n[extensions]\n\tobjectformat = {}\n",
                self.object_format.as_str()
            ),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.serialize()).map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HashAlgorithm::Sha1)]
    #[case(HashAlgorithm::Sha256)]
    fn reads_back_what_it_writes(#[case] algorithm: HashAlgorithm) {
        let config = Config::new(algorithm);

        assert_eq!(Config::parse(&config.serialize()).unwrap(), config);
    }

    #[test]
    fn ignores_unrelated_settings() {
        let content = "# comment\n[core]\n\tbare = false\n[Extensions]\n\tobjectFormat = sha256\n";

        assert_eq!(
            Config::parse(content).unwrap().object_format,
            HashAlgorithm::Sha256
        );
    }

    #[test]
    fn rejects_unknown_object_formats() {
        let content = "[extensions]\n\tobjectformat = md5\n";

        assert!(matches!(Config::parse(content), Err(Error::Corrupt(_))));
    }
}
