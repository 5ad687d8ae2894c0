//! Rename pairing
//!
//! A deleted path and an added path are paired into one renamed delta when
//! their contents score at or above the threshold. Scoring is pluggable;
//! identical ids always score 100 without loading any content.

use crate::areas::store::ObjectStore;
use crate::artifacts::diff::delta::{Delta, DeltaStatus};
use crate::artifacts::diff::hunk::split_lines;
use crate::artifacts::diff::myers::{DiffAlgorithm, MyersDiff};
use crate::artifacts::diff::options::RenameDetection;
use crate::artifacts::objects::file_mode::FileMode;
use crate::errors::Result;
use bytes::Bytes;
use std::fmt::Debug;

pub trait SimilarityScorer: Debug {
    /// Similarity of two contents, in percent
    fn score(&self, old: &Bytes, new: &Bytes) -> u8;
}

/// Only byte-identical contents are similar
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchScorer;

impl SimilarityScorer for ExactMatchScorer {
    fn score(&self, old: &Bytes, new: &Bytes) -> u8 {
        if old == new { 100 } else { 0 }
    }
}

/// Share of lines kept between the two contents
#[derive(Debug, Clone, Copy, Default)]
pub struct LineScorer;

impl SimilarityScorer for LineScorer {
    fn score(&self, old: &Bytes, new: &Bytes) -> u8 {
        let old_lines = split_lines(old);
        let new_lines = split_lines(new);
        let total = old_lines.len() + new_lines.len();
        if total == 0 {
            return 100;
        }

        let kept = MyersDiff::new(&old_lines, &new_lines)
            .diff()
            .iter()
            .filter(|edit| edit.is_equal())
            .count();

        (kept * 200 / total) as u8
    }
}

pub struct RenameDetector<'r> {
    store: &'r dyn ObjectStore,
    detection: &'r RenameDetection,
}

impl<'r> RenameDetector<'r> {
    pub fn new(store: &'r dyn ObjectStore, detection: &'r RenameDetection) -> Self {
        RenameDetector { store, detection }
    }

    /// Replace matching deleted/added pairs by renamed deltas
    ///
    /// Each deleted path pairs with at most one added path, preferring the
    /// best score; ties go to the added path that sorts first.
    pub fn detect(&self, deltas: Vec<Delta>) -> Result<Vec<Delta>> {
        let deleted = deltas
            .iter()
            .enumerate()
            .filter(|(_, delta)| {
                delta.status == DeltaStatus::Deleted && has_content(delta.old.map(|e| e.mode))
            })
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let added = deltas
            .iter()
            .enumerate()
            .filter(|(_, delta)| {
                delta.status == DeltaStatus::Added && has_content(delta.new.map(|e| e.mode))
            })
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        if deleted.is_empty() || added.is_empty() {
            return Ok(deltas);
        }

        let mut claimed = vec![false; deltas.len()];
        let mut pairs = Vec::new();

        for &old_index in &deleted {
            let mut best: Option<(usize, u8)> = None;

            for &new_index in added.iter().filter(|&&i| !claimed[i]) {
                let score = self.score(&deltas[old_index], &deltas[new_index])?;
                if score >= self.detection.threshold
                    && best.is_none_or(|(_, best_score)| score > best_score)
                {
                    best = Some((new_index, score));
                }
            }

            if let Some((new_index, score)) = best {
                claimed[new_index] = true;
                claimed[old_index] = true;
                pairs.push((old_index, new_index, score));
            }
        }

        tracing::debug!(renames = pairs.len(), "paired renamed paths");

        let mut renamed = pairs
            .into_iter()
            .map(|(old_index, new_index, score)| {
                let old = &deltas[old_index];
                let new = &deltas[new_index];
                let mut delta =
                    Delta::new(DeltaStatus::Renamed, new.new_path.clone(), old.old, new.new);
                delta.old_path = old.old_path.clone();
                delta.similarity = Some(score);
                (new_index, delta)
            })
            .collect::<std::collections::HashMap<_, _>>();

        Ok(deltas
            .into_iter()
            .enumerate()
            .filter_map(|(i, delta)| match renamed.remove(&i) {
                Some(rename) => Some(rename),
                None if claimed[i] => None,
                None => Some(delta),
            })
            .collect())
    }

    fn score(&self, old: &Delta, new: &Delta) -> Result<u8> {
        let (Some(old), Some(new)) = (old.old, new.new) else {
            return Ok(0);
        };
        if old.oid == new.oid {
            return Ok(100);
        }

        let old = self.store.lookup_blob(&old.oid)?;
        let new = self.store.lookup_blob(&new.oid)?;
        if old.is_binary() || new.is_binary() {
            return Ok(0);
        }

        Ok(self.detection.scorer.score(old.content(), new.content()))
    }
}

fn has_content(mode: Option<FileMode>) -> bool {
    mode.is_some_and(|mode| mode.has_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::store::MemoryStore;
    use crate::artifacts::database::database_entry::DatabaseEntry;
    use crate::artifacts::objects::blob::Blob;
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::object_id::HashAlgorithm;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn blob_entry(store: &MemoryStore, content: &str) -> DatabaseEntry {
        let oid = store.write(&Object::Blob(Blob::from(content))).unwrap();
        DatabaseEntry::new(oid, FileMode::Blob)
    }

    #[test]
    fn line_scorer_counts_shared_lines() {
        let old = Bytes::from_static(b"a\nb\nc\nd\n");
        let new = Bytes::from_static(b"a\nb\nc\nx\n");

        assert_eq!(LineScorer.score(&old, &new), 75);
        assert_eq!(ExactMatchScorer.score(&old, &new), 0);
    }

    #[test]
    fn pairs_similar_deleted_and_added_paths() {
        let store = MemoryStore::new(HashAlgorithm::Sha1);
        let old = blob_entry(&store, "one\ntwo\nthree\nfour\n");
        let new = blob_entry(&store, "one\ntwo\nthree\nfive\n");
        let other = blob_entry(&store, "unrelated\n");
        let deltas = vec![
            Delta::new(DeltaStatus::Added, PathBuf::from("b.txt"), None, Some(new)),
            Delta::new(DeltaStatus::Added, PathBuf::from("c.txt"), None, Some(other)),
            Delta::new(DeltaStatus::Deleted, PathBuf::from("a.txt"), Some(old), None),
        ];
        let detection = RenameDetection::new(Rc::new(LineScorer));

        let deltas = RenameDetector::new(&store, &detection).detect(deltas).unwrap();

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].status, DeltaStatus::Renamed);
        assert_eq!(deltas[0].old_path, PathBuf::from("a.txt"));
        assert_eq!(deltas[0].new_path, PathBuf::from("b.txt"));
        assert_eq!(deltas[0].similarity, Some(75));
        assert_eq!(deltas[1].status, DeltaStatus::Added);
    }

    #[test]
    fn scores_below_threshold_stay_separate() {
        let store = MemoryStore::new(HashAlgorithm::Sha1);
        let old = blob_entry(&store, "a\n");
        let new = blob_entry(&store, "b\n");
        let deltas = vec![
            Delta::new(DeltaStatus::Deleted, PathBuf::from("a"), Some(old), None),
            Delta::new(DeltaStatus::Added, PathBuf::from("b"), None, Some(new)),
        ];
        let detection = RenameDetection::new(Rc::new(ExactMatchScorer));

        let deltas = RenameDetector::new(&store, &detection).detect(deltas).unwrap();

        assert!(deltas.iter().all(|delta| delta.status != DeltaStatus::Renamed));
    }
}
