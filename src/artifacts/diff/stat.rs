//! `--stat` style summaries of a diff

use crate::artifacts::diff::delta::{DeltaStatus, Diff};
use std::fmt;
use std::path::PathBuf;

/// Widest `+`/`-` bar drawn for one file
const MAX_GRAPH_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: PathBuf,
    pub insertions: usize,
    pub deletions: usize,
    pub binary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStat {
    files: Vec<FileStat>,
}

impl DiffStat {
    pub fn from_diff(diff: &Diff) -> Self {
        let files = diff
            .iter()
            .filter(|delta| delta.status != DeltaStatus::Unmodified)
            .map(|delta| FileStat {
                path: delta.path().to_path_buf(),
                insertions: delta.additions(),
                deletions: delta.deletions(),
                binary: delta.binary,
            })
            .collect();

        DiffStat { files }
    }

    pub fn files(&self) -> &[FileStat] {
        &self.files
    }

    pub fn files_changed(&self) -> usize {
        self.files.len()
    }

    pub fn insertions(&self) -> usize {
        self.files.iter().map(|file| file.insertions).sum()
    }

    pub fn deletions(&self) -> usize {
        self.files.iter().map(|file| file.deletions).sum()
    }

    /// `N files changed, X insertions(+), Y deletions(-)`
    ///
    /// A zero count is left out unless both counts are zero.
    pub fn summary(&self) -> String {
        let (files, insertions, deletions) =
            (self.files_changed(), self.insertions(), self.deletions());
        let mut summary = format!("{files} file{} changed", plural(files));

        if insertions > 0 || deletions == 0 {
            summary.push_str(&format!(", {insertions} insertion{}(+)", plural(insertions)));
        }
        if deletions > 0 || insertions == 0 {
            summary.push_str(&format!(", {deletions} deletion{}(-)", plural(deletions)));
        }

        summary
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

impl fmt::Display for DiffStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_width = self
            .files
            .iter()
            .map(|file| file.path.display().to_string().len())
            .max()
            .unwrap_or(0);
        let widest = self
            .files
            .iter()
            .map(|file| file.insertions + file.deletions)
            .max()
            .unwrap_or(0);

        for file in &self.files {
            let name = file.path.display().to_string();
            if file.binary {
                writeln!(f, " {name:<name_width$} | Bin")?;
                continue;
            }

            let changes = file.insertions + file.deletions;
            let (plus, minus) = if widest > MAX_GRAPH_WIDTH {
                (
                    file.insertions * MAX_GRAPH_WIDTH / widest,
                    file.deletions * MAX_GRAPH_WIDTH / widest,
                )
            } else {
                (file.insertions, file.deletions)
            };
            writeln!(
                f,
                " {name:<name_width$} | {changes} {}{}",
                "+".repeat(plus),
                "-".repeat(minus)
            )?;
        }

        writeln!(f, " {}", self.summary())
    }
}
