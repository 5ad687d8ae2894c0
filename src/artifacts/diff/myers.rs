//! Myers' shortest edit script
//!
//! Edits carry indices into the compared sequences instead of values, so
//! callers can recover line numbers and content from their own buffers.
//! A common prefix and suffix are matched up front; the O(ND) search only
//! runs on the differing middle, and gives up on minimality past
//! [`MAX_EDIT_COST`] edits.

use derive_new::new;

/// Edits searched for before the middle is replaced wholesale
pub const MAX_EDIT_COST: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Delete { old: usize },
    Insert { new: usize },
    Equal { old: usize, new: usize },
}

impl Edit {
    pub fn is_equal(&self) -> bool {
        matches!(self, Edit::Equal { .. })
    }
}

pub trait DiffAlgorithm {
    /// Edit script turning the old sequence into the new one, in order
    fn diff(&self) -> Vec<Edit>;
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MyersDiff<'d, T> {
    a: &'d [T],
    b: &'d [T],
}

impl<T: Eq> MyersDiff<'_, T> {
    /// Furthest-reaching `x` per diagonal before each round `d`
    ///
    /// Round `d` only reads diagonals `-(d + 1)..=d + 1`, so only that band
    /// is kept, indexed by `k + d + 1`.
    fn compute_shortest_edit(a: &[T], b: &[T]) -> Option<Vec<Vec<isize>>> {
        let (n, m) = (a.len() as isize, b.len() as isize);
        let offset = n + m + 1;

        let mut v = vec![0; 2 * offset as usize + 1];
        let mut trace = Vec::new();

        for d in 0..=(n + m).min(MAX_EDIT_COST as isize) {
            trace.push(v[(offset - d - 1) as usize..=(offset + d + 1) as usize].to_vec());

            for k in (-d..=d).step_by(2) {
                let idx = (offset + k) as usize;

                let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                    // moved down from k+1: an insertion
                    v[idx + 1]
                } else {
                    // moved right from k-1: a deletion
                    v[idx - 1] + 1
                };

                let mut y = x - k;
                while x < n && y < m && a[x as usize] == b[y as usize] {
                    x += 1;
                    y += 1;
                }

                v[idx] = x;

                if x >= n && y >= m {
                    return Some(trace);
                }
            }
        }

        tracing::debug!(old = n, new = m, "edit script too expensive, replacing wholesale");
        None
    }

    /// Path of `(prev_x, prev_y, x, y)` moves from the end back to the start
    fn backtrack(a: &[T], b: &[T]) -> Vec<(isize, isize, isize, isize)> {
        let (mut x, mut y) = (a.len() as isize, b.len() as isize);
        let mut edit_path = Vec::new();

        let Some(trace) = Self::compute_shortest_edit(a, b) else {
            // every insertion, then every deletion, walking backwards
            edit_path.extend((0..y).rev().map(|j| (x, j, x, j + 1)));
            edit_path.extend((0..x).rev().map(|i| (i, 0, i + 1, 0)));
            return edit_path;
        };
        for (d, band) in trace.iter().enumerate().rev() {
            let d = d as isize;
            let k = x - y;
            let v = |k: isize| band[(k + d + 1) as usize];

            let prev_k = if k == -d || (k != d && v(k - 1) < v(k + 1)) {
                k + 1
            } else {
                k - 1
            };

            let prev_x = v(prev_k);
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                edit_path.push((x - 1, y - 1, x, y));
                x -= 1;
                y -= 1;
            }

            if d > 0 {
                edit_path.push((prev_x, prev_y, x, y));
            }

            (x, y) = (prev_x, prev_y);
        }

        edit_path
    }
}

impl<T: Eq> DiffAlgorithm for MyersDiff<'_, T> {
    fn diff(&self) -> Vec<Edit> {
        let prefix = self
            .a
            .iter()
            .zip(self.b.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = self.a[prefix..]
            .iter()
            .rev()
            .zip(self.b[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let a = &self.a[prefix..self.a.len() - suffix];
        let b = &self.b[prefix..self.b.len() - suffix];

        let mut edits = (0..prefix)
            .map(|i| Edit::Equal { old: i, new: i })
            .collect::<Vec<_>>();

        if !a.is_empty() || !b.is_empty() {
            let mut middle = Vec::new();
            for (prev_x, prev_y, x, y) in Self::backtrack(a, b) {
                let (old, new) = (prefix + prev_x as usize, prefix + prev_y as usize);
                if x == prev_x {
                    middle.push(Edit::Insert { new });
                } else if y == prev_y {
                    middle.push(Edit::Delete { old });
                } else {
                    middle.push(Edit::Equal { old, new });
                }
            }
            middle.reverse();
            edits.extend(middle);
        }

        let (a_tail, b_tail) = (self.a.len() - suffix, self.b.len() - suffix);
        edits.extend((0..suffix).map(|i| Edit::Equal {
            old: a_tail + i,
            new: b_tail + i,
        }));

        edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    fn render<T: Clone>(a: &[T], b: &[T], edits: &[Edit]) -> Vec<(char, T)> {
        edits
            .iter()
            .map(|edit| match *edit {
                Edit::Delete { old } => ('-', a[old].clone()),
                Edit::Insert { new } => ('+', b[new].clone()),
                Edit::Equal { old, .. } => (' ', a[old].clone()),
            })
            .collect()
    }

    #[fixture]
    fn string_inputs() -> (Vec<char>, Vec<char>) {
        ("abcabba".chars().collect(), "cbabac".chars().collect())
    }

    #[rstest]
    fn finds_the_classic_shortest_script(string_inputs: (Vec<char>, Vec<char>)) {
        let (a, b) = string_inputs;
        let edits = MyersDiff::new(&a, &b).diff();

        // the paper's example needs five edits
        assert_eq!(edits.iter().filter(|edit| !edit.is_equal()).count(), 5);
        assert_eq!(
            render(&a, &b, &edits)
                .iter()
                .filter(|(op, _)| *op != '+')
                .map(|(_, c)| *c)
                .collect::<String>(),
            "abcabba"
        );
    }

    #[test]
    fn expensive_scripts_fall_back_to_replacing_the_middle() {
        let a = (0..MAX_EDIT_COST).collect::<Vec<_>>();
        let b = std::iter::once(0)
            .chain(MAX_EDIT_COST..2 * MAX_EDIT_COST)
            .collect::<Vec<_>>();

        let edits = MyersDiff::new(&a, &b).diff();

        assert_eq!(edits[0], Edit::Equal { old: 0, new: 0 });
        let (deletes, inserts): (Vec<&Edit>, Vec<&Edit>) = edits[1..]
            .iter()
            .partition(|edit| matches!(edit, Edit::Delete { .. }));
        assert_eq!(deletes.len(), MAX_EDIT_COST - 1);
        assert_eq!(inserts.len(), MAX_EDIT_COST);
        assert!(edits[1..MAX_EDIT_COST].iter().all(|edit| matches!(edit, Edit::Delete { .. })));
        assert_eq!(
            render(&a, &b, &edits)
                .into_iter()
                .filter(|(op, _)| *op != '-')
                .map(|(_, value)| value)
                .collect::<Vec<_>>(),
            b
        );
    }

    #[rstest]
    fn diffs_lines() {
        let a = vec!["line1", "line2", "line3", "line4"];
        let b = vec!["line2", "line3_modified", "line4", "line5"];

        let edits = MyersDiff::new(&a, &b).diff();

        assert_eq!(
            render(&a, &b, &edits),
            vec![
                ('-', "line1"),
                (' ', "line2"),
                ('-', "line3"),
                ('+', "line3_modified"),
                (' ', "line4"),
                ('+', "line5"),
            ]
        );
    }

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec!["x"], vec![])]
    #[case(vec![], vec!["x"])]
    fn handles_empty_sides(#[case] a: Vec<&str>, #[case] b: Vec<&str>) {
        let edits = MyersDiff::new(&a, &b).diff();

        assert_eq!(edits.len(), a.len() + b.len());
    }

    proptest! {
        #[test]
        fn edit_scripts_rebuild_both_sides(
            a in prop::collection::vec(0u8..4, 0..24),
            b in prop::collection::vec(0u8..4, 0..24),
        ) {
            let edits = MyersDiff::new(&a, &b).diff();
            let rendered = render(&a, &b, &edits);

            let old = rendered.iter().filter(|(op, _)| *op != '+').map(|(_, v)| *v).collect::<Vec<_>>();
            let new = rendered.iter().filter(|(op, _)| *op != '-').map(|(_, v)| *v).collect::<Vec<_>>();
            prop_assert_eq!(old, a);
            prop_assert_eq!(new, b);
        }
    }
}
