use crate::areas::repository::Repository;
use crate::areas::store::ObjectStore;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;

impl Repository {
    /// Resolve a revision expression to an object id
    pub fn rev_parse(&self, revision: &str) -> Result<ObjectId> {
        Revision::try_parse(revision)?.resolve(self.refs(), self.store())
    }

    /// Resolve a revision expression and load the object it names
    pub fn revparse_single(&self, revision: &str) -> Result<Object> {
        Revision::try_parse(revision)?.resolve_object(self.refs(), self.store())
    }

    pub fn resolve_commit(&self, revision: &str) -> Result<ObjectId> {
        self.database().peel_to_commit(&self.rev_parse(revision)?)
    }

    /// Tree named by a revision; commits and tags are peeled
    pub fn resolve_tree(&self, revision: &str) -> Result<ObjectId> {
        self.database().peel_to_tree(&self.rev_parse(revision)?)
    }
}
