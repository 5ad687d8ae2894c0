use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};

impl Repository {
    /// Create a branch at `source` (HEAD by default)
    pub fn branch(&self, name: &str, source: Option<&str>) -> Result<ObjectId> {
        let name = BranchName::try_parse(name)?;
        let source_oid = match source {
            Some(revision) => self.resolve_commit(revision)?,
            None => self
                .head_commit()?
                .ok_or_else(|| Error::invalid_argument("no commit on HEAD to branch from"))?,
        };

        self.refs().create_branch(&name, source_oid)?;
        Ok(source_oid)
    }

    /// Branch names, with the current one flagged
    pub fn list_branches(&self) -> Result<Vec<(SymRefName, bool)>> {
        let current = self.refs().current_ref(None)?;

        Ok(self
            .refs()
            .list_branches()?
            .into_iter()
            .map(|branch| {
                let is_current = branch == current;
                (branch, is_current)
            })
            .collect())
    }

    /// Lightweight tag on the object a revision names
    pub fn tag(&self, name: &str, revision: &str) -> Result<ObjectId> {
        let name = BranchName::try_parse(name)?;
        let oid = self.rev_parse(revision)?;

        self.refs().create_tag(&name, oid)?;
        Ok(oid)
    }

    /// Point HEAD at an existing branch without touching index or workspace
    pub fn switch_head(&self, name: &str) -> Result<()> {
        let name = BranchName::try_parse(name)?;
        if self.refs().read_ref(&name)?.is_none() {
            return Err(Error::UnknownRevision(name.to_string()));
        }

        self.refs().set_head(&name)
    }
}
