use crate::areas::refs::Refs;
use crate::areas::store::ObjectStore;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::{ANCESTOR_REGEX, PARENT_REGEX, REF_ALIASES};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use std::fmt;

/// Shortest hex prefix accepted as an abbreviated object id
const MIN_PREFIX_LENGTH: usize = 4;
const MAX_HEX_LENGTH: usize = 64;

/// A parsed revision expression
///
/// Supported forms:
/// - ref names: `main`, `feature/x`, `v1.0`, `HEAD`, and the alias `@`
/// - full or abbreviated hex object ids, tried only when no ref matches
/// - `<rev>^` for the first parent
/// - `<rev>~<n>` for the n-th first-parent ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A ref name, or hex id when no ref matches
    Ref(BranchName),
    Ancestor(Box<Revision>, usize),
    Parent(Box<Revision>),
}

impl Revision {
    pub fn try_parse(revision: &str) -> Result<Revision> {
        let parent = regex::Regex::new(PARENT_REGEX)
            .map_err(|e| Error::invalid_argument(format!("invalid parent regex: {e}")))?;
        let ancestor = regex::Regex::new(ANCESTOR_REGEX)
            .map_err(|e| Error::invalid_argument(format!("invalid ancestor regex: {e}")))?;

        if let Some(captures) = parent.captures(revision) {
            return Ok(Revision::Parent(Box::new(Self::try_parse(&captures[1])?)));
        }

        if let Some(captures) = ancestor.captures(revision) {
            let generations = captures[2]
                .parse()
                .map_err(|_| Error::UnknownRevision(revision.to_string()))?;
            return Ok(Revision::Ancestor(
                Box::new(Self::try_parse(&captures[1])?),
                generations,
            ));
        }

        let name = *REF_ALIASES.get(revision).unwrap_or(&revision);
        BranchName::try_parse(name)
            .map(Revision::Ref)
            .map_err(|_| Error::UnknownRevision(revision.to_string()))
    }

    /// Resolve to an object id; `^` and `~` peel through tags to commits
    pub fn resolve(&self, refs: &Refs, store: &dyn ObjectStore) -> Result<ObjectId> {
        match self {
            Revision::Ref(name) => match refs.read_ref(name)? {
                Some(oid) => Ok(oid),
                None if looks_like_oid(name.as_ref()) => resolve_oid(name.as_ref(), store),
                None => Err(Error::UnknownRevision(name.to_string())),
            },
            Revision::Parent(base) => {
                let oid = base.resolve(refs, store)?;
                first_parent(oid, store)?.ok_or_else(|| Error::UnknownRevision(self.to_string()))
            }
            Revision::Ancestor(base, generations) => {
                let mut oid = base.resolve(refs, store)?;
                for _ in 0..*generations {
                    oid = first_parent(oid, store)?
                        .ok_or_else(|| Error::UnknownRevision(self.to_string()))?;
                }

                Ok(oid)
            }
        }
    }

    /// Resolve and load the named object
    pub fn resolve_object(&self, refs: &Refs, store: &dyn ObjectStore) -> Result<Object> {
        store.lookup(&self.resolve(refs, store)?)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Ref(name) => write!(f, "{name}"),
            Revision::Parent(base) => write!(f, "{base}^"),
            Revision::Ancestor(base, generations) => write!(f, "{base}~{generations}"),
        }
    }
}

fn first_parent(oid: ObjectId, store: &dyn ObjectStore) -> Result<Option<ObjectId>> {
    let commit = store.peel_to_commit(&oid)?;
    Ok(store.lookup_commit(&commit)?.parent())
}

fn looks_like_oid(name: &str) -> bool {
    (MIN_PREFIX_LENGTH..=MAX_HEX_LENGTH).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolve a full or abbreviated hex id, preferring commits when a prefix
/// is ambiguous
fn resolve_oid(hex: &str, store: &dyn ObjectStore) -> Result<ObjectId> {
    if let Ok(oid) = ObjectId::try_parse(hex)
        && oid.algorithm() == store.hash_algorithm()
    {
        return match store.contains(&oid)? {
            true => Ok(oid),
            false => Err(Error::UnknownRevision(hex.to_string())),
        };
    }

    let matches = store.find_by_prefix(hex)?;
    match matches.as_slice() {
        [] => Err(Error::UnknownRevision(hex.to_string())),
        [oid] => Ok(*oid),
        candidates => {
            let commits = candidates
                .iter()
                .filter(|oid| matches!(store.lookup(oid), Ok(Object::Commit(_))))
                .collect::<Vec<_>>();

            match commits.as_slice() {
                [oid] => Ok(**oid),
                _ => {
                    let hint = candidates
                        .iter()
                        .map(|oid| oid.to_short_oid())
                        .collect::<Vec<_>>()
                        .join(", ");
                    Err(Error::invalid_argument(format!(
                        "short object id {hex} is ambiguous; candidates are {hint}"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::store::MemoryStore;
    use crate::artifacts::objects::commit::{Commit, Signature};
    use crate::artifacts::objects::object_id::HashAlgorithm;
    use crate::artifacts::objects::object_type::ObjectType;
    use crate::artifacts::objects::tag::Tag;
    use crate::artifacts::objects::tree::Tree;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    fn name(name: &str) -> Revision {
        Revision::Ref(BranchName::try_parse(name).unwrap())
    }

    #[rstest]
    #[case("main", name("main"))]
    #[case("@", name("HEAD"))]
    #[case("main^", Revision::Parent(Box::new(name("main"))))]
    #[case("main~3", Revision::Ancestor(Box::new(name("main")), 3))]
    #[case(
        "main^^",
        Revision::Parent(Box::new(Revision::Parent(Box::new(name("main")))))
    )]
    #[case("a1b2c3d", name("a1b2c3d"))]
    fn parses_revisions(#[case] input: &str, #[case] expected: Revision) {
        assert_eq!(Revision::try_parse(input).unwrap(), expected);
        assert_eq!(expected.to_string().replace("HEAD", "@"), input);
    }

    #[rstest]
    #[case("")]
    #[case("invalid name")]
    #[case(".invalid^")]
    #[case("feature..name~2")]
    fn rejects_malformed_revisions(#[case] input: &str) {
        assert!(matches!(
            Revision::try_parse(input),
            Err(Error::UnknownRevision(_))
        ));
    }

    proptest! {
        #[test]
        fn ancestor_counts_round_trip(generations in 0usize..1000) {
            let revision = Revision::try_parse(&format!("topic~{generations}")).unwrap();
            prop_assert_eq!(revision, Revision::Ancestor(Box::new(name("topic")), generations));
        }
    }

    struct Repo {
        dir: TempDir,
        store: MemoryStore,
        commits: Vec<ObjectId>,
    }

    impl Repo {
        fn refs(&self) -> Refs {
            Refs::new(self.dir.path().into())
        }

        fn resolve(&self, revision: &str) -> Result<ObjectId> {
            Revision::try_parse(revision)?.resolve(&self.refs(), &self.store)
        }
    }

    /// Three linear commits on `main`, a `v1` tag object on the first
    #[fixture]
    fn repo() -> Repo {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        std::fs::write(dir.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let store = MemoryStore::new(HashAlgorithm::Sha1);
        let tree = store.write(&Object::Tree(Tree::default())).unwrap();
        let mut commits = Vec::new();
        for i in 0..3 {
            let author = Signature::try_from(format!("A <a@b.c> {} +0000", 1_700_000_000 + i).as_str())
                .unwrap();
            let parents = commits.last().copied().into_iter().collect();
            let commit = Commit::new(parents, tree, author, format!("commit {i}"));
            commits.push(store.write(&Object::Commit(commit)).unwrap());
        }

        let refs = Refs::new(dir.path().into());
        refs.update_head(commits[2]).unwrap();
        let tag = Tag::new(commits[0], ObjectType::Commit, "v1", None, "first");
        let tag = store.write(&Object::Tag(tag)).unwrap();
        refs.create_tag(&BranchName::try_parse("v1").unwrap(), tag).unwrap();

        Repo {
            dir,
            store,
            commits,
        }
    }

    #[rstest]
    fn resolves_refs_and_aliases(repo: Repo) {
        assert_eq!(repo.resolve("HEAD").unwrap(), repo.commits[2]);
        assert_eq!(repo.resolve("@").unwrap(), repo.commits[2]);
        assert_eq!(repo.resolve("main").unwrap(), repo.commits[2]);
    }

    #[rstest]
    fn walks_parents_and_ancestors(repo: Repo) {
        assert_eq!(repo.resolve("HEAD^").unwrap(), repo.commits[1]);
        assert_eq!(repo.resolve("main~2").unwrap(), repo.commits[0]);
        assert_eq!(repo.resolve("@~0").unwrap(), repo.commits[2]);
        assert!(matches!(repo.resolve("HEAD~3"), Err(Error::UnknownRevision(_))));
    }

    #[rstest]
    fn tags_resolve_to_the_tag_object(repo: Repo) {
        let tag = repo.resolve("v1").unwrap();

        assert!(matches!(repo.store.lookup(&tag), Ok(Object::Tag(_))));
        assert_eq!(repo.resolve("v1~0").unwrap(), tag);
        assert!(matches!(repo.resolve("v1^"), Err(Error::UnknownRevision(_))));
    }

    #[rstest]
    fn resolves_full_and_abbreviated_ids(repo: Repo) {
        let full = repo.commits[1].to_string();

        assert_eq!(repo.resolve(&full).unwrap(), repo.commits[1]);
        assert_eq!(repo.resolve(&full[..10]).unwrap(), repo.commits[1]);
        assert_eq!(repo.resolve(&format!("{}^", &full[..10])).unwrap(), repo.commits[0]);
    }

    #[rstest]
    fn unknown_names_are_reported(repo: Repo) {
        assert!(matches!(repo.resolve("nope"), Err(Error::UnknownRevision(_))));
        assert!(matches!(repo.resolve("deadbeef"), Err(Error::UnknownRevision(_))));
        assert!(matches!(
            repo.resolve(&"0".repeat(40)),
            Err(Error::UnknownRevision(_))
        ));
    }
}
