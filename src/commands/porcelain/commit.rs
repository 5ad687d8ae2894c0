use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Commit, Signature};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};

impl Repository {
    /// Commit the index on top of HEAD
    ///
    /// After a conflicted merge has been resolved, the pending merge head
    /// becomes the second parent.
    pub fn commit(&self, message: &str, author: Signature) -> Result<(ObjectId, Commit)> {
        let mut parents = self.head_commit()?.into_iter().collect::<Vec<_>>();
        let merge_head = self.merge_head()?;
        parents.extend(merge_head);

        let result = self.write_commit(parents, message, author)?;

        if merge_head.is_some() {
            let path = self.merge_head_path();
            std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        }

        tracing::info!(oid = %result.0, parents = result.1.parents().len(), "committed");
        Ok(result)
    }
}

/// `[main (root-commit) abc1234] message` summary line
pub fn commit_summary(branch: Option<&str>, oid: &ObjectId, commit: &Commit) -> String {
    let root = if commit.parents().is_empty() {
        " (root-commit)"
    } else {
        ""
    };

    format!(
        "[{}{root} {}] {}",
        branch.unwrap_or("detached HEAD"),
        oid.to_short_oid(),
        commit.short_message()
    )
}
