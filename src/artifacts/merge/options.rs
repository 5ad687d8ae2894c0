use crate::artifacts::objects::commit::Signature;

/// Knobs for one merge invocation
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Create a merge commit when the trees reconcile cleanly
    pub commit_on_success: bool,
    pub message: Option<String>,
    /// Rewrite workspace files along with the index
    pub update_workspace: bool,
    /// When false, a fast-forwardable merge still produces a merge commit
    pub allow_fast_forward: bool,
    /// Author and committer of the merge commit
    pub merger: Signature,
}

impl MergeOptions {
    pub fn new(merger: Signature) -> Self {
        MergeOptions {
            commit_on_success: true,
            message: None,
            update_workspace: true,
            allow_fast_forward: true,
            merger,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn without_commit(mut self) -> Self {
        self.commit_on_success = false;
        self
    }

    pub fn without_fast_forward(mut self) -> Self {
        self.allow_fast_forward = false;
        self
    }

    pub fn without_workspace(mut self) -> Self {
        self.update_workspace = false;
        self
    }

    /// Message for the merge commit of `theirs` into the current branch
    pub fn message_for(&self, theirs: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("Merge {theirs}"))
    }
}
