//! Line-level three-way merge
//!
//! Each side is diffed against the base and its edit script cut into
//! change regions: a base line range plus the lines replacing it. Regions
//! from the two sides conflict when their base ranges overlap. An insertion
//! (empty range) conflicts when it falls strictly inside the other side's
//! range, or sits at the same point as another insertion with different
//! text. Regions that merely touch are applied one after the other, and
//! identical regions on both sides count once.

use crate::artifacts::diff::hunk::split_lines;
use crate::artifacts::diff::myers::{DiffAlgorithm, Edit, MyersDiff};
use bytes::{BufMut, Bytes, BytesMut};
use derive_new::new;

const OURS_MARKER: &str = "<<<<<<<";
const SEPARATOR_MARKER: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Ours,
    Theirs,
}

/// Base lines `start..end` replaced by `lines`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    side: Side,
    start: usize,
    end: usize,
    lines: Vec<Bytes>,
}

impl Region {
    fn same_change(&self, other: &Region) -> bool {
        self.start == other.start && self.end == other.end && self.lines == other.lines
    }

    fn conflicts_with(&self, other: &Region) -> bool {
        let (a, b) = (self, other);
        match (a.start == a.end, b.start == b.end) {
            (true, true) => a.start == b.start && a.lines != b.lines,
            (true, false) => b.start < a.start && a.start < b.end,
            (false, true) => a.start < b.start && b.start < a.end,
            (false, false) => a.start < b.end && b.start < a.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedText {
    /// Merged content; conflicting blocks are wrapped in markers
    pub content: Bytes,
    pub conflicts: usize,
}

impl MergedText {
    pub fn is_clean(&self) -> bool {
        self.conflicts == 0
    }
}

#[derive(Debug, Clone, new)]
pub struct ThreeWayMerge<'a> {
    base: &'a Bytes,
    ours: &'a Bytes,
    theirs: &'a Bytes,
}

impl ThreeWayMerge<'_> {
    /// Merge both sides onto the base, labelling conflict markers with
    /// `ours_label` and `theirs_label`
    pub fn merge(&self, ours_label: &str, theirs_label: &str) -> MergedText {
        let base = split_lines(self.base);
        let mut regions = regions_of(&base, &split_lines(self.ours), Side::Ours);
        regions.extend(regions_of(&base, &split_lines(self.theirs), Side::Theirs));
        regions.sort_by_key(|region| (region.start, region.end, region.side == Side::Theirs));

        let mut output = BytesMut::new();
        let mut conflicts = 0;
        let mut position = 0;

        for cluster in clusters(regions) {
            let start = cluster.iter().map(|region| region.start).min().unwrap_or(position);
            let end = cluster.iter().map(|region| region.end).max().unwrap_or(position);

            put_lines(&mut output, &base[position..start]);

            let ours = apply(&base, start, end, &cluster, Side::Ours);
            let theirs = apply(&base, start, end, &cluster, Side::Theirs);
            let one_sided = cluster.iter().all(|region| region.side == cluster[0].side);

            if one_sided || ours == theirs {
                let side = if one_sided { cluster[0].side } else { Side::Ours };
                put_lines(&mut output, &apply(&base, start, end, &cluster, side));
            } else {
                conflicts += 1;
                put_marker(&mut output, OURS_MARKER, Some(ours_label));
                put_lines(&mut output, &ours);
                put_marker(&mut output, SEPARATOR_MARKER, None);
                put_lines(&mut output, &theirs);
                put_marker(&mut output, THEIRS_MARKER, Some(theirs_label));
            }

            position = end;
        }
        put_lines(&mut output, &base[position..]);

        MergedText {
            content: output.freeze(),
            conflicts,
        }
    }
}

/// Change regions of one side's edit script against the base
fn regions_of(base: &[Bytes], side: &[Bytes], tag: Side) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut current: Option<Region> = None;
    let mut base_position = 0;

    for edit in MyersDiff::new(base, side).diff() {
        match edit {
            Edit::Equal { old, .. } => {
                regions.extend(current.take());
                base_position = old + 1;
            }
            Edit::Delete { old } => {
                let region = current.get_or_insert_with(|| Region {
                    side: tag,
                    start: old,
                    end: old,
                    lines: Vec::new(),
                });
                region.end = old + 1;
                base_position = old + 1;
            }
            Edit::Insert { new } => {
                let region = current.get_or_insert_with(|| Region {
                    side: tag,
                    start: base_position,
                    end: base_position,
                    lines: Vec::new(),
                });
                region.lines.push(side[new].clone());
            }
        }
    }
    regions.extend(current);

    regions
}

/// Group sorted regions into runs that must be resolved together
fn clusters(regions: Vec<Region>) -> Vec<Vec<Region>> {
    let mut clusters: Vec<Vec<Region>> = Vec::new();

    for region in regions {
        let joins = clusters.last().is_some_and(|cluster| {
            cluster.iter().any(|member| {
                member.side != region.side
                    && (member.conflicts_with(&region) || member.same_change(&region))
            })
        });

        match clusters.last_mut() {
            Some(cluster) if joins => cluster.push(region),
            _ => clusters.push(vec![region]),
        }
    }

    clusters
}

/// Base lines `start..end` with one side's regions of the cluster applied
fn apply(base: &[Bytes], start: usize, end: usize, cluster: &[Region], side: Side) -> Vec<Bytes> {
    let mut lines = Vec::new();
    let mut position = start;

    for region in cluster.iter().filter(|region| region.side == side) {
        lines.extend_from_slice(&base[position..region.start]);
        lines.extend(region.lines.iter().cloned());
        position = region.end;
    }
    lines.extend_from_slice(&base[position..end]);

    lines
}

fn put_lines(output: &mut BytesMut, lines: &[Bytes]) {
    for line in lines {
        output.put_slice(line);
    }
}

fn put_marker(output: &mut BytesMut, marker: &str, label: Option<&str>) {
    if output.last().is_some_and(|byte| *byte != b'\n') {
        output.put_u8(b'\n');
    }
    output.put_slice(marker.as_bytes());
    if let Some(label) = label {
        output.put_u8(b' ');
        output.put_slice(label.as_bytes());
    }
    output.put_u8(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn merge(base: &str, ours: &str, theirs: &str) -> (String, usize) {
        let (base, ours, theirs) = (
            Bytes::copy_from_slice(base.as_bytes()),
            Bytes::copy_from_slice(ours.as_bytes()),
            Bytes::copy_from_slice(theirs.as_bytes()),
        );
        let merged = ThreeWayMerge::new(&base, &ours, &theirs).merge("ours", "theirs");

        (String::from_utf8(merged.content.to_vec()).unwrap(), merged.conflicts)
    }

    #[test]
    fn changes_to_different_lines_combine() {
        assert_eq!(
            merge("1\n2\n3\n", "1\nX\n3\n", "1\n2\nY\n"),
            ("1\nX\nY\n".to_string(), 0)
        );
    }

    #[test]
    fn changes_to_the_same_line_conflict() {
        assert_eq!(
            merge("1\n2\n3\n", "1\nX\n3\n", "1\nY\n3\n"),
            (
                "1\n<<<<<<< ours\nX\n=======\nY\n>>>>>>> theirs\n3\n".to_string(),
                1
            )
        );
    }

    #[rstest]
    #[case("a\nb\n", "a\nB\n", "a\nB\n", "a\nB\n")]
    #[case("a\nb\n", "a\nb\n", "a\nb\nc\n", "a\nb\nc\n")]
    #[case("a\nb\nc\n", "b\nc\n", "a\nb\n", "b\n")]
    #[case("a\nc\n", "x\na\nc\n", "a\nb\nc\n", "x\na\nb\nc\n")]
    fn clean_merges(
        #[case] base: &str,
        #[case] ours: &str,
        #[case] theirs: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(merge(base, ours, theirs), (expected.to_string(), 0));
    }

    #[rstest]
    #[case("a\nc\n", "a\nb\nc\n", "a\nx\nc\n")]
    #[case("a\nb\nc\n", "a\nc\n", "a\nB\nc\n")]
    #[case("", "one\n", "two\n")]
    fn conflicting_merges(#[case] base: &str, #[case] ours: &str, #[case] theirs: &str) {
        assert_eq!(merge(base, ours, theirs).1, 1);
    }

    #[test]
    fn markers_start_on_their_own_line() {
        let (merged, conflicts) = merge("a", "b", "c");

        assert_eq!(conflicts, 1);
        assert_eq!(merged, "<<<<<<< ours\nb\n=======\nc\n>>>>>>> theirs\n");
    }

    proptest! {
        #[test]
        fn one_sided_changes_are_taken_verbatim(
            base in prop::collection::vec("[abc]\n", 0..12),
            theirs in prop::collection::vec("[abc]\n", 0..12),
        ) {
            let base = base.concat();
            let theirs = theirs.concat();

            prop_assert_eq!(merge(&base, &base, &theirs), (theirs.clone(), 0));
            prop_assert_eq!(merge(&base, &theirs, &base), (theirs, 0));
        }
    }
}
