use crate::areas::repository::Repository;
use crate::areas::store::ObjectStore;
use crate::artifacts::objects::commit::{Commit, Signature};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeBuilder;
use crate::errors::{Error, Result};

impl Repository {
    /// Store a commit of the staged tree and move HEAD to it
    pub fn write_commit(
        &self,
        parents: Vec<ObjectId>,
        message: &str,
        author: Signature,
    ) -> Result<(ObjectId, Commit)> {
        let tree_oid = self.write_tree()?;

        let commit = Commit::new(parents, tree_oid, author, message.trim());
        let commit_oid = self.database().write(&Object::Commit(commit.clone()))?;
        self.refs().update_head(commit_oid)?;

        Ok((commit_oid, commit))
    }

    /// Store the trees of the cleanly staged index, returning the root id
    pub fn write_tree(&self) -> Result<ObjectId> {
        let mut index = self.index();
        index.rehydrate()?;

        if index.has_conflicts() {
            return Err(Error::invalid_argument(
                "cannot write a tree while the index has unresolved conflicts",
            ));
        }

        let mut builder = TreeBuilder::new();
        for entry in index.entries() {
            builder.insert(&entry.name, entry.as_database_entry())?;
        }

        let built = builder.build(self.hash_algorithm())?;
        for (_, tree) in built.trees {
            self.database().write(&Object::Tree(tree))?;
        }

        Ok(built.root)
    }
}
