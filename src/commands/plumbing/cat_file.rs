use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use crate::errors::Result;

impl Repository {
    /// Object named by `revision`, rendered the way `cat-file -p` does
    pub fn cat_file(&self, revision: &str) -> Result<(Object, String)> {
        let object = self.revparse_single(revision)?;
        let rendered = object.display();

        Ok((object, rendered))
    }
}
