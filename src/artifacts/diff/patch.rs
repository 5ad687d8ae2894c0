//! Unified patch text

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::delta::{Delta, DeltaStatus, Diff};
use crate::artifacts::diff::hunk::{Hunk, LineOrigin};
use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;
use std::fmt;
use std::path::Path;

const NULL_PATH: &str = "/dev/null";
const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

#[derive(Debug, Clone, Copy)]
pub struct Patch<'d> {
    diff: &'d Diff,
    color: bool,
}

impl<'d> Patch<'d> {
    pub fn new(diff: &'d Diff) -> Self {
        Patch { diff, color: false }
    }

    /// Highlight headers and changed lines with terminal colors
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn write_delta(&self, f: &mut fmt::Formatter<'_>, delta: &Delta) -> fmt::Result {
        let a = Path::new("a").join(&delta.old_path);
        let b = Path::new("b").join(&delta.new_path);

        self.header(f, format!("diff --git {} {}", a.display(), b.display()))?;
        self.write_mode(f, delta)?;

        if delta.old_id() != delta.new_id() {
            let mut index = format!(
                "index {}..{}",
                short_oid(delta.old, delta.new),
                short_oid(delta.new, delta.old)
            );
            if let (Some(old), Some(new)) = (delta.old, delta.new)
                && old.mode == new.mode
            {
                index.push_str(&format!(" {}", old.mode));
            }
            self.header(f, index)?;
        }

        let old_path = match delta.old {
            Some(_) => a.display().to_string(),
            None => NULL_PATH.to_string(),
        };
        let new_path = match delta.new {
            Some(_) => b.display().to_string(),
            None => NULL_PATH.to_string(),
        };

        if delta.binary {
            return writeln!(f, "Binary files {old_path} and {new_path} differ");
        }
        if delta.hunks.is_empty() {
            return Ok(());
        }

        self.header(f, format!("--- {old_path}"))?;
        self.header(f, format!("+++ {new_path}"))?;
        for hunk in &delta.hunks {
            self.write_hunk(f, hunk)?;
        }

        Ok(())
    }

    fn write_mode(&self, f: &mut fmt::Formatter<'_>, delta: &Delta) -> fmt::Result {
        if delta.status == DeltaStatus::Renamed {
            writeln!(f, "similarity index {}%", delta.similarity.unwrap_or(100))?;
            writeln!(f, "rename from {}", delta.old_path.display())?;
            writeln!(f, "rename to {}", delta.new_path.display())?;
        }

        match (delta.old, delta.new) {
            (None, Some(new)) => self.header(f, format!("new file mode {}", new.mode)),
            (Some(old), None) => self.header(f, format!("deleted file mode {}", old.mode)),
            (Some(old), Some(new)) if old.mode != new.mode => {
                self.header(f, format!("old mode {}", old.mode))?;
                self.header(f, format!("new mode {}", new.mode))
            }
            _ => Ok(()),
        }
    }

    fn write_hunk(&self, f: &mut fmt::Formatter<'_>, hunk: &Hunk) -> fmt::Result {
        let header = hunk.header();
        if self.color {
            writeln!(f, "{}", header.cyan())?;
        } else {
            writeln!(f, "{header}")?;
        }

        for line in &hunk.lines {
            let content = String::from_utf8_lossy(&line.content);
            let text = format!("{}{}", line.origin.as_char(), content.trim_end_matches('\n'));
            match (self.color, line.origin) {
                (true, LineOrigin::Addition) => writeln!(f, "{}", text.green())?,
                (true, LineOrigin::Deletion) => writeln!(f, "{}", text.red())?,
                _ => writeln!(f, "{text}")?,
            }
            if !line.has_newline() {
                writeln!(f, "{NO_NEWLINE_MARKER}")?;
            }
        }

        Ok(())
    }

    fn header(&self, f: &mut fmt::Formatter<'_>, text: String) -> fmt::Result {
        if self.color {
            writeln!(f, "{}", text.bold())
        } else {
            writeln!(f, "{text}")
        }
    }
}

impl fmt::Display for Patch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for delta in self.diff {
            if delta.status == DeltaStatus::Unmodified {
                continue;
            }
            self.write_delta(f, delta)?;
        }

        Ok(())
    }
}

/// Short id of `entry`, or the null id when the side is absent
fn short_oid(entry: Option<DatabaseEntry>, other: Option<DatabaseEntry>) -> String {
    match (entry, other) {
        (Some(entry), _) => entry.oid.to_short_oid(),
        (None, Some(other)) => ObjectId::null(other.oid.algorithm()).to_short_oid(),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::diff::hunk::diff_lines;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::file_mode::FileMode;
    use crate::artifacts::objects::object::{Object, Packable};
    use crate::artifacts::objects::object_id::HashAlgorithm;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn entry(content: &str, mode: FileMode) -> DatabaseEntry {
        let oid = Object::Blob(Blob::from(content))
            .object_id(HashAlgorithm::Sha1)
            .unwrap();
        DatabaseEntry::new(oid, mode)
    }

    fn delta_between(path: &str, old: Option<&str>, new: Option<&str>) -> Delta {
        let mut delta = Delta::from_entries(
            PathBuf::from(path),
            old.map(|content| entry(content, FileMode::Blob)),
            new.map(|content| entry(content, FileMode::Blob)),
        )
        .unwrap();
        delta.hunks = diff_lines(
            &Bytes::copy_from_slice(old.unwrap_or("").as_bytes()),
            &Bytes::copy_from_slice(new.unwrap_or("").as_bytes()),
            3,
        );
        delta
    }

    #[test]
    fn formats_a_modified_file() {
        let diff = Diff::new(vec![delta_between("a.txt", Some("1\n2\n3\n"), Some("1\nX\n3\n"))]);
        let old = entry("1\n2\n3\n", FileMode::Blob).oid.to_short_oid();
        let new = entry("1\nX\n3\n", FileMode::Blob).oid.to_short_oid();

        assert_eq!(
            diff.patch().to_string(),
            format!(
                "diff --git a/a.txt b/a.txt\n\
                 index {old}..{new} 100644\n\
                 --- a/a.txt\n\
                 +++ b/a.txt\n\
                 @@ -1,3 +1,3 @@\n \
                 1\n\
                 -2\n\
                 +X\n \
                 3\n"
            )
        );
    }

    #[test]
    fn new_files_come_from_dev_null() {
        let diff = Diff::new(vec![delta_between("new.txt", None, Some("hello"))]);

        let patch = diff.patch().to_string();

        assert!(patch.contains("new file mode 100644\n"));
        assert!(patch.contains("index 0000000.."));
        assert!(patch.contains("--- /dev/null\n+++ b/new.txt\n"));
        assert!(patch.ends_with("+hello\n\\ No newline at end of file\n"));
    }

    #[test]
    fn binary_files_only_get_a_summary() {
        let mut delta = delta_between("bin", Some("a"), Some("b"));
        delta.hunks.clear();
        delta.binary = true;

        let patch = Diff::new(vec![delta]).patch().to_string();

        assert!(patch.ends_with("Binary files a/bin and b/bin differ\n"));
        assert!(!patch.contains("@@"));
    }

    #[test]
    fn mode_changes_are_reported() {
        let delta = Delta::from_entries(
            PathBuf::from("run.sh"),
            Some(entry("x", FileMode::Blob)),
            Some(entry("x", FileMode::Executable)),
        )
        .unwrap();

        assert_eq!(
            Diff::new(vec![delta]).patch().to_string(),
            "diff --git a/run.sh b/run.sh\nold mode 100644\nnew mode 100755\n"
        );
    }
}
