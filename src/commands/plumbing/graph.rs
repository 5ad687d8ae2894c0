use crate::areas::repository::Repository;
use crate::artifacts::graph::walker::GraphWalker;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};

impl Repository {
    /// Best common ancestor of two revisions
    ///
    /// Disjoint histories are reported as [`Error::NoMergeBase`].
    pub fn merge_base(&self, ours: &str, theirs: &str) -> Result<ObjectId> {
        let (ours, theirs) = (self.resolve_commit(ours)?, self.resolve_commit(theirs)?);

        GraphWalker::new(self.store())
            .merge_base(&ours, &theirs)?
            .ok_or(Error::NoMergeBase { ours, theirs })
    }

    /// Every best common ancestor, lowest id first
    pub fn merge_bases(&self, ours: &str, theirs: &str) -> Result<Vec<ObjectId>> {
        let (ours, theirs) = (self.resolve_commit(ours)?, self.resolve_commit(theirs)?);

        GraphWalker::new(self.store()).merge_bases(&ours, &theirs)
    }

    /// Commits reachable from `local` but not `upstream`, and the reverse
    pub fn ahead_behind(&self, local: &str, upstream: &str) -> Result<(usize, usize)> {
        let (local, upstream) = (self.resolve_commit(local)?, self.resolve_commit(upstream)?);

        GraphWalker::new(self.store()).ahead_behind(&local, &upstream)
    }

    /// Whether `commit` strictly descends from `ancestor`
    pub fn is_descendant(&self, commit: &str, ancestor: &str) -> Result<bool> {
        let (commit, ancestor) = (self.resolve_commit(commit)?, self.resolve_commit(ancestor)?);

        GraphWalker::new(self.store()).is_descendant(&commit, &ancestor)
    }
}
