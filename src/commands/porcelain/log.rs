use crate::areas::repository::Repository;
use crate::areas::store::ObjectStore;
use crate::artifacts::graph::walker::GraphWalker;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;

impl Repository {
    /// Commits reachable from `start` (HEAD by default), newest first
    pub fn log(&self, start: Option<&str>, limit: Option<usize>) -> Result<Vec<(ObjectId, Commit)>> {
        let start = match start {
            Some(revision) => self.resolve_commit(revision)?,
            None => match self.head_commit()? {
                Some(oid) => oid,
                None => return Ok(Vec::new()),
            },
        };

        GraphWalker::new(self.store())
            .history(&start)?
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|slim| Ok((slim.oid, self.database().lookup_commit(&slim.oid)?)))
            .collect()
    }
}

/// One-line rendering: short id and subject
pub fn oneline(oid: &ObjectId, commit: &Commit) -> String {
    format!("{} {}", oid.to_short_oid(), commit.short_message())
}
