//! Commit graph queries: merge bases, ahead/behind counts, descendancy
//!
//! ## Finding merge bases
//!
//! Both commits are walked at once, newest commit first. Every commit
//! carries flags saying from which side it was reached; a commit reached
//! from both sides is a common ancestor, and everything below it is marked
//! stale so it cannot be reported as well.
//!
//! The walk can still report common ancestors that sit below another one
//! (reached through a different path before the stale mark arrives). A
//! second pass removes every candidate reachable from another candidate,
//! leaving the best common ancestors:
//!
//! > a best common ancestor of X and Y is a common ancestor of X and Y
//! > that is not an ancestor of any other common ancestor.
//!
//! Criss-cross histories have several best common ancestors. `merge_bases`
//! returns all of them sorted by id, and `merge_base` picks the lowest id so
//! the choice never depends on traversal order.

use crate::areas::store::ObjectStore;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;
use bitflags::bitflags;
use std::cell::RefCell;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct VisitState: u8 {
        const NONE = 0b0000;
        const VISITED_FROM_SOURCE = 0b0001;
        const VISITED_FROM_TARGET = 0b0010;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b0100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

/// Parsed commits, by id, kept for the lifetime of one walker
#[derive(Debug, Default)]
struct CommitCache {
    commits: RefCell<HashMap<ObjectId, SlimCommit>>,
}

impl CommitCache {
    fn get_or_load(&self, store: &dyn ObjectStore, oid: &ObjectId) -> Result<SlimCommit> {
        if let Some(commit) = self.commits.borrow().get(oid) {
            return Ok(commit.clone());
        }

        let commit = store.lookup_commit(oid)?.to_slim(*oid);
        self.commits.borrow_mut().insert(*oid, commit.clone());
        Ok(commit)
    }
}

pub struct GraphWalker<'s> {
    store: &'s dyn ObjectStore,
    cache: CommitCache,
}

impl<'s> GraphWalker<'s> {
    pub fn new(store: &'s dyn ObjectStore) -> Self {
        GraphWalker {
            store,
            cache: CommitCache::default(),
        }
    }

    fn load(&self, oid: &ObjectId) -> Result<SlimCommit> {
        self.cache.get_or_load(self.store, oid)
    }

    /// Flag every commit reachable from `source` or `targets`, returning
    /// the common ancestors that are not below another common ancestor
    /// found during the walk
    fn find_common_ancestors(
        &self,
        source: &ObjectId,
        targets: &HashSet<ObjectId>,
    ) -> Result<HashMap<ObjectId, VisitState>> {
        let source_commit = self.load(source)?;
        if targets.contains(source) {
            return Ok(HashMap::from([(*source, VisitState::RESULT)]));
        }

        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = BinaryHeap::new();

        states.insert(*source, VisitState::VISITED_FROM_SOURCE);
        queue.push((source_commit.timestamp, *source));

        for target in targets {
            let target_commit = self.load(target)?;
            states.insert(*target, VisitState::VISITED_FROM_TARGET);
            queue.push((target_commit.timestamp, *target));
        }

        while let Some((_, oid)) = queue.pop() {
            let current_state = states.get(&oid).copied().unwrap_or(VisitState::NONE);
            tracing::trace!(commit = %oid.to_short_oid(), state = ?current_state, "visiting commit");

            if current_state.contains(VisitState::STALE) {
                continue;
            }

            let is_common = current_state.contains(VisitState::VISITED_FROM_BOTH);
            if is_common {
                states.insert(oid, current_state | VisitState::RESULT);
            }

            let commit = self.load(&oid)?;
            for parent in &commit.parents {
                let parent_state = states.get(parent).copied().unwrap_or(VisitState::NONE);

                let mut next_state = parent_state | current_state;
                if is_common {
                    next_state |= VisitState::STALE;
                }

                if next_state != parent_state {
                    let parent_commit = self.load(parent)?;
                    states.insert(*parent, next_state);
                    queue.push((parent_commit.timestamp, *parent));
                }
            }
        }

        Ok(states
            .into_iter()
            .filter(|(_, state)| {
                !state.contains(VisitState::STALE) && state.contains(VisitState::RESULT)
            })
            .collect())
    }

    /// All best common ancestors of `ours` and `theirs`, sorted by id
    ///
    /// Empty when the histories are disjoint.
    pub fn merge_bases(&self, ours: &ObjectId, theirs: &ObjectId) -> Result<Vec<ObjectId>> {
        let candidates = self
            .find_common_ancestors(ours, &HashSet::from([*theirs]))?
            .into_keys()
            .collect::<HashSet<_>>();
        tracing::debug!(count = candidates.len(), "found common ancestors");

        let mut redundant = HashSet::<ObjectId>::new();
        for candidate in &candidates {
            if redundant.contains(candidate) {
                continue;
            }

            let others = candidates
                .iter()
                .filter(|other| *other != candidate && !redundant.contains(*other))
                .copied()
                .collect::<HashSet<_>>();
            if others.is_empty() {
                continue;
            }

            let states = self.reachability(candidate, &others)?;

            // the candidate is reachable from another candidate
            if states
                .get(candidate)
                .is_some_and(|state| state.contains(VisitState::VISITED_FROM_TARGET))
            {
                redundant.insert(*candidate);
            }
            // another candidate is reachable from this one
            for other in others {
                if states
                    .get(&other)
                    .is_some_and(|state| state.contains(VisitState::VISITED_FROM_SOURCE))
                {
                    redundant.insert(other);
                }
            }
        }

        let mut bases = candidates
            .into_iter()
            .filter(|candidate| !redundant.contains(candidate))
            .collect::<Vec<_>>();
        bases.sort();
        tracing::debug!(
            bases = ?bases.iter().map(ObjectId::to_short_oid).collect::<Vec<_>>(),
            "best common ancestors"
        );

        Ok(bases)
    }

    /// Flags of every commit reachable from `source` or any of `targets`,
    /// without pruning
    fn reachability(
        &self,
        source: &ObjectId,
        targets: &HashSet<ObjectId>,
    ) -> Result<HashMap<ObjectId, VisitState>> {
        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = VecDeque::new();

        states.insert(*source, VisitState::NONE);
        queue.push_back((*source, VisitState::VISITED_FROM_SOURCE));
        for target in targets {
            queue.push_back((*target, VisitState::VISITED_FROM_TARGET));
        }

        // a starting point only gains a flag when another starting point
        // reaches it
        while let Some((oid, flag)) = queue.pop_front() {
            let commit = self.load(&oid)?;
            for parent in &commit.parents {
                let state = states.entry(*parent).or_insert(VisitState::NONE);
                if !state.contains(flag) {
                    *state |= flag;
                    queue.push_back((*parent, flag));
                }
            }
        }

        Ok(states)
    }

    /// The merge base of `ours` and `theirs`: the lowest id among the best
    /// common ancestors, or `None` for disjoint histories
    pub fn merge_base(&self, ours: &ObjectId, theirs: &ObjectId) -> Result<Option<ObjectId>> {
        Ok(self.merge_bases(ours, theirs)?.into_iter().next())
    }

    /// Commits reachable only from `local`, and only from `upstream`
    ///
    /// Every reachable commit is visited, so skewed commit times cannot
    /// make the counts stop early.
    pub fn ahead_behind(&self, local: &ObjectId, upstream: &ObjectId) -> Result<(usize, usize)> {
        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = VecDeque::from([
            (*local, VisitState::VISITED_FROM_SOURCE),
            (*upstream, VisitState::VISITED_FROM_TARGET),
        ]);

        while let Some((oid, flag)) = queue.pop_front() {
            let state = states.entry(oid).or_insert(VisitState::NONE);
            if state.contains(flag) {
                continue;
            }
            *state |= flag;

            for parent in self.load(&oid)?.parents {
                queue.push_back((parent, flag));
            }
        }

        let count = |side: VisitState| {
            states
                .values()
                .filter(|state| (**state & VisitState::VISITED_FROM_BOTH) == side)
                .count()
        };

        Ok((
            count(VisitState::VISITED_FROM_SOURCE),
            count(VisitState::VISITED_FROM_TARGET),
        ))
    }

    /// Whether `ancestor` is a proper ancestor of `commit`
    pub fn is_descendant(&self, commit: &ObjectId, ancestor: &ObjectId) -> Result<bool> {
        if commit == ancestor {
            self.load(commit)?;
            return Ok(false);
        }

        Ok(self.merge_bases(commit, ancestor)?.contains(ancestor))
    }

    /// Commits reachable from `start`, newest first
    pub fn history(&self, start: &ObjectId) -> Result<Vec<SlimCommit>> {
        let mut seen = HashSet::from([*start]);
        let mut queue = BinaryHeap::new();
        let mut commits = Vec::new();

        let first = self.load(start)?;
        queue.push((first.timestamp, *start));

        while let Some((_, oid)) = queue.pop() {
            let commit = self.load(&oid)?;
            for parent in &commit.parents {
                if seen.insert(*parent) {
                    queue.push((self.load(parent)?.timestamp, *parent));
                }
            }
            commits.push(commit);
        }

        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::store::MemoryStore;
    use crate::artifacts::objects::commit::{Commit, Signature};
    use crate::artifacts::objects::object::Object;
    use crate::artifacts::objects::object_id::HashAlgorithm;
    use crate::artifacts::objects::tree::Tree;
    use crate::errors::Error;
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    /// Commits written one hour apart, named for readable assertions
    struct History {
        store: MemoryStore,
        names: HashMap<String, ObjectId>,
    }

    impl History {
        fn new() -> Self {
            History {
                store: MemoryStore::new(HashAlgorithm::Sha1),
                names: HashMap::new(),
            }
        }

        fn commit(&mut self, name: &str, parents: &[&str]) -> ObjectId {
            let hours = self.names.len() as i64;
            self.commit_at(name, parents, hours)
        }

        fn commit_at(&mut self, name: &str, parents: &[&str], hours: i64) -> ObjectId {
            let tree = self.store.write(&Object::Tree(Tree::default())).unwrap();
            let timestamp = FixedOffset::east_opt(0)
                .unwrap()
                .timestamp_opt(1_640_995_200 + hours * 3600, 0)
                .unwrap();
            let author = Signature::new_with_timestamp("A U Thor", "author@example.com", timestamp);
            let parents = parents.iter().map(|parent| self.names[*parent]).collect();
            let oid = self
                .store
                .write(&Object::Commit(Commit::new(parents, tree, author, name)))
                .unwrap();
            self.names.insert(name.to_string(), oid);
            oid
        }

        fn id(&self, name: &str) -> ObjectId {
            self.names[name]
        }

        fn walker(&self) -> GraphWalker<'_> {
            GraphWalker::new(&self.store)
        }
    }

    //   A - B - C - D
    #[fixture]
    fn linear() -> History {
        let mut history = History::new();
        history.commit("A", &[]);
        history.commit("B", &["A"]);
        history.commit("C", &["B"]);
        history.commit("D", &["C"]);
        history
    }

    //     A
    //    / \
    //   B   C
    //   |\ /|
    //   | X |
    //   |/ \|
    //   D   E
    #[fixture]
    fn criss_cross() -> History {
        let mut history = History::new();
        history.commit("A", &[]);
        history.commit("B", &["A"]);
        history.commit("C", &["A"]);
        history.commit("D", &["B", "C"]);
        history.commit("E", &["C", "B"]);
        history
    }

    #[rstest]
    fn merge_base_of_a_commit_with_itself_is_the_commit(linear: History) {
        let c = linear.id("C");

        assert_eq!(linear.walker().merge_base(&c, &c).unwrap(), Some(c));
        assert_eq!(linear.walker().ahead_behind(&c, &c).unwrap(), (0, 0));
    }

    #[rstest]
    #[case("B", "D", "B")]
    #[case("D", "B", "B")]
    #[case("A", "D", "A")]
    fn ancestor_is_the_merge_base_in_linear_history(
        linear: History,
        #[case] ours: &str,
        #[case] theirs: &str,
        #[case] expected: &str,
    ) {
        let base = linear.walker().merge_base(&linear.id(ours), &linear.id(theirs)).unwrap();

        assert_eq!(base, Some(linear.id(expected)));
    }

    #[test]
    fn forked_branches_meet_at_the_fork_point() {
        let mut history = History::new();
        history.commit("A", &[]);
        history.commit("B", &["A"]);
        history.commit("C", &["B"]);
        history.commit("X1", &["C"]);
        history.commit("Y1", &["C"]);
        history.commit("X2", &["X1"]);
        history.commit("Y2", &["Y1"]);
        history.commit("Y3", &["Y2"]);

        let walker = history.walker();
        let (x, y) = (history.id("X2"), history.id("Y3"));

        assert_eq!(walker.merge_base(&x, &y).unwrap(), Some(history.id("C")));
        assert_eq!(walker.ahead_behind(&x, &y).unwrap(), (2, 3));
    }

    #[rstest]
    fn criss_cross_reports_every_best_ancestor(criss_cross: History) {
        let walker = criss_cross.walker();
        let (d, e) = (criss_cross.id("D"), criss_cross.id("E"));
        let mut expected = vec![criss_cross.id("B"), criss_cross.id("C")];
        expected.sort();

        let bases = walker.merge_bases(&d, &e).unwrap();

        assert_eq!(bases, expected);
        // the lowest id wins the tie
        assert_eq!(walker.merge_base(&d, &e).unwrap(), Some(expected[0]));
    }

    #[test]
    fn a_merged_side_branch_moves_the_base_up() {
        //   A - B - M - N
        //    \     /
        //     C - D - E
        let mut history = History::new();
        history.commit("A", &[]);
        history.commit("B", &["A"]);
        history.commit("C", &["A"]);
        history.commit("D", &["C"]);
        history.commit("M", &["B", "D"]);
        history.commit("E", &["D"]);
        history.commit("N", &["M"]);

        let base = history.walker().merge_base(&history.id("N"), &history.id("E")).unwrap();

        assert_eq!(base, Some(history.id("D")));
    }

    #[test]
    fn skewed_clocks_do_not_hide_the_base() {
        // B claims to be older than its parent
        let mut history = History::new();
        history.commit_at("A", &[], 10);
        history.commit_at("B", &["A"], 0);
        history.commit_at("C", &["B"], 11);
        history.commit_at("D", &["A"], 12);

        let walker = history.walker();
        let (c, d) = (history.id("C"), history.id("D"));

        assert_eq!(walker.merge_base(&c, &d).unwrap(), Some(history.id("A")));
        assert_eq!(walker.ahead_behind(&c, &d).unwrap(), (2, 1));
    }

    #[test]
    fn disjoint_histories_have_no_base() {
        let mut history = History::new();
        history.commit("A", &[]);
        history.commit("B", &["A"]);
        history.commit("X", &[]);

        let walker = history.walker();
        let (b, x) = (history.id("B"), history.id("X"));

        assert_eq!(walker.merge_base(&b, &x).unwrap(), None);
        assert!(!walker.is_descendant(&b, &x).unwrap());
        assert_eq!(walker.ahead_behind(&b, &x).unwrap(), (2, 1));
    }

    #[rstest]
    fn descendancy_follows_parent_edges(linear: History) {
        let walker = linear.walker();
        let (a, c, d) = (linear.id("A"), linear.id("C"), linear.id("D"));

        assert!(walker.is_descendant(&d, &c).unwrap());
        assert!(walker.is_descendant(&d, &a).unwrap());
        assert!(!walker.is_descendant(&c, &d).unwrap());
        assert!(!walker.is_descendant(&d, &d).unwrap());
    }

    #[rstest]
    fn history_is_newest_first(linear: History) {
        let ids = linear
            .walker()
            .history(&linear.id("D"))
            .unwrap()
            .into_iter()
            .map(|commit| commit.oid)
            .collect::<Vec<_>>();

        assert_eq!(ids, ["D", "C", "B", "A"].map(|name| linear.id(name)));
    }

    #[test]
    fn missing_commits_are_lookup_errors() {
        let history = History::new();
        let missing = HashAlgorithm::Sha1.digest(b"nothing");

        let result = history.walker().merge_base(&missing, &missing);

        assert!(matches!(result, Err(Error::NotFound(oid)) if oid == missing));
    }
}
