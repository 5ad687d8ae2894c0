use assert_fs::TempDir;
use assert_fs::prelude::{FileWriteStr, PathChild, PathCreateDir};
use graft::areas::repository::Repository;
use graft::areas::store::ObjectStore;
use graft::artifacts::branch::branch_name::BranchName;
use graft::artifacts::diff::delta::DeltaStatus;
use graft::artifacts::diff::options::{DiffOptions, DiffOutput};
use graft::artifacts::merge::options::MergeOptions;
use graft::artifacts::objects::commit::Signature;
use graft::artifacts::objects::object_id::HashAlgorithm;
use graft::commands::porcelain::diff::DiffResult;
use graft::{Error, Result};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::path::PathBuf;

fn author() -> Signature {
    Signature::new("fake_user", "fake_email@email.com")
}

struct Fixture {
    dir: TempDir,
    repository: Repository,
}

impl Fixture {
    fn new(algorithm: HashAlgorithm) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let repository = Repository::init(dir.path(), algorithm).expect("init");
        Fixture { dir, repository }
    }

    fn write(&self, path: &str, content: &str) {
        self.dir.child(path).write_str(content).expect("write file");
    }

    fn commit(&self, files: &[(&str, &str)], message: &str) -> Result<String> {
        for (path, content) in files {
            self.write(path, content);
        }
        self.repository.add(&[PathBuf::from(".")])?;
        let (oid, _) = self.repository.commit(message, author())?;
        Ok(oid.to_string())
    }
}

#[fixture]
fn repo() -> Fixture {
    Fixture::new(HashAlgorithm::Sha1)
}

#[rstest]
fn structured_diff_reports_statuses(repo: Fixture) -> Result<()> {
    repo.commit(&[("keep.txt", "k\n"), ("gone.txt", "g\n")], "first")?;
    std::fs::remove_file(repo.dir.path().join("gone.txt")).expect("remove");
    repo.write("keep.txt", "changed\n");

    let result = repo.repository.diff(
        None,
        None,
        false,
        &DiffOptions::default(),
        &DiffOutput::Structured,
    )?;

    let DiffResult::Structured(diff) = result else {
        panic!("expected a structured diff");
    };
    let statuses = diff
        .iter()
        .map(|delta| (delta.path().display().to_string(), delta.status))
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            ("gone.txt".to_string(), DeltaStatus::Deleted),
            ("keep.txt".to_string(), DeltaStatus::Modified),
        ]
    );
    assert_eq!(diff.delta("keep.txt".as_ref()).map(|d| d.hunks.len()), Some(1));

    Ok(())
}

#[rstest]
fn text_and_file_outputs_hold_the_same_patch(repo: Fixture) -> Result<()> {
    repo.commit(&[("a.txt", "a\n")], "first")?;
    repo.commit(&[("a.txt", "b\n")], "second")?;
    let options = DiffOptions::default();

    let DiffResult::Text(text) =
        repo.repository
            .diff(Some("HEAD^"), Some("HEAD"), false, &options, &DiffOutput::Text)?
    else {
        panic!("expected text");
    };
    let DiffResult::Written(path) = repo.repository.diff(
        Some("HEAD^"),
        Some("HEAD"),
        false,
        &options,
        &DiffOutput::File(PathBuf::from("out.patch")),
    )?
    else {
        panic!("expected a written file");
    };

    assert!(text.contains("-a\n+b\n"));
    assert_eq!(path, repo.repository.path().join("out.patch"));
    assert_eq!(std::fs::read_to_string(&path).expect("patch file"), text);

    Ok(())
}

#[rstest]
fn a_second_tree_needs_a_first(repo: Fixture) {
    let err = repo
        .repository
        .diff(
            None,
            Some("HEAD"),
            false,
            &DiffOptions::default(),
            &DiffOutput::Structured,
        )
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[rstest]
fn unwritable_output_is_an_output_error(repo: Fixture) -> Result<()> {
    repo.commit(&[("a.txt", "a\n")], "first")?;
    repo.write("a.txt", "b\n");
    repo.dir.child("taken").create_dir_all().expect("mkdir");

    let err = repo
        .repository
        .diff(
            None,
            None,
            false,
            &DiffOptions::default(),
            &DiffOutput::File(PathBuf::from("taken")),
        )
        .unwrap_err();

    assert!(err.is_output_error());
    assert!(repo.dir.path().join("taken").is_dir());
    let leftovers = std::fs::read_dir(repo.dir.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
        .count();
    assert_eq!(leftovers, 0);

    Ok(())
}

#[rstest]
fn disjoint_histories_have_no_merge_base(repo: Fixture) -> Result<()> {
    let main = repo.commit(&[("a.txt", "a\n")], "main root")?;
    repo.repository
        .refs()
        .set_head(&BranchName::try_parse("orphan")?)?;
    let orphan = repo.commit(&[("b.txt", "b\n")], "orphan root")?;
    repo.repository
        .refs()
        .set_head(&BranchName::try_parse("main")?)?;

    let err = repo.repository.merge_base("main", "orphan").unwrap_err();
    assert!(
        matches!(&err, Error::NoMergeBase { ours, theirs }
            if ours.to_string() == main && theirs.to_string() == orphan)
    );
    assert!(err.is_graph_error());

    let err = repo
        .repository
        .merge("orphan", &MergeOptions::new(author()))
        .unwrap_err();
    assert!(matches!(err, Error::NoMergeBase { .. }));
    assert!(repo.repository.merge_bases("main", "orphan")?.is_empty());

    Ok(())
}

#[rstest]
fn merging_into_an_unborn_branch_fast_forwards(repo: Fixture) -> Result<()> {
    let tip = repo.commit(&[("a.txt", "a\n")], "first")?;
    repo.repository
        .refs()
        .set_head(&BranchName::try_parse("fresh")?)?;
    std::fs::remove_file(repo.dir.path().join("a.txt")).expect("remove");
    repo.repository.add(&[PathBuf::from("a.txt")])?;

    let result = repo.repository.merge("main", &MergeOptions::new(author()))?;

    assert!(result.fast_forward);
    assert_eq!(
        repo.repository.head_commit()?.map(|oid| oid.to_string()),
        Some(tip)
    );
    assert_eq!(
        std::fs::read_to_string(repo.dir.path().join("a.txt")).expect("file"),
        "a\n"
    );

    Ok(())
}

#[rstest]
fn merges_can_leave_the_workspace_alone(repo: Fixture) -> Result<()> {
    repo.commit(&[("f.txt", "1\n2\n3\n")], "A")?;
    repo.repository.branch("topic", None)?;
    repo.commit(&[("f.txt", "1\nX\n3\n")], "B")?;

    repo.repository.switch_head("topic")?;
    repo.commit(&[("f.txt", "1\n2\nY\n")], "C")?;
    repo.repository.switch_head("main")?;
    repo.write("f.txt", "1\nX\n3\n");
    repo.repository.add(&[PathBuf::from("f.txt")])?;

    let options = MergeOptions::new(author()).without_workspace();
    let result = repo.repository.merge("topic", &options)?;

    assert!(!result.has_conflicts);
    let commit = result.commit.expect("merge commit");
    assert_eq!(
        std::fs::read_to_string(repo.dir.path().join("f.txt")).expect("file"),
        "1\nX\n3\n"
    );
    assert_eq!(repo.repository.head_commit()?, Some(commit));
    let (_, entry) = repo
        .repository
        .ls_tree("HEAD", true)?
        .into_iter()
        .find(|(path, _)| path == &PathBuf::from("f.txt"))
        .expect("f.txt in merged tree");
    assert_eq!(
        repo.repository.database().lookup_blob(&entry.oid)?.content().as_ref(),
        b"1\nX\nY\n"
    );

    Ok(())
}

#[rstest]
fn sha256_repositories_merge_end_to_end() -> Result<()> {
    let repo = Fixture::new(HashAlgorithm::Sha256);
    repo.commit(&[("f.txt", "base\n")], "A")?;
    repo.repository.branch("topic", None)?;
    repo.commit(&[("main.txt", "main\n")], "B")?;
    repo.repository.switch_head("topic")?;
    std::fs::remove_file(repo.dir.path().join("main.txt")).expect("remove");
    repo.repository.add(&[PathBuf::from("main.txt")])?;
    let theirs = repo.commit(&[("topic.txt", "topic\n")], "C")?;
    repo.repository.switch_head("main")?;
    repo.write("main.txt", "main\n");
    std::fs::remove_file(repo.dir.path().join("topic.txt")).expect("remove");
    repo.repository.add(&[PathBuf::from(".")])?;

    let result = repo.repository.merge("topic", &MergeOptions::new(author()))?;

    let commit = result.commit.expect("merge commit");
    assert_eq!(commit.to_string().len(), 64);
    let merged = repo.repository.database().lookup_commit(&commit)?;
    assert_eq!(merged.parents()[1].to_string(), theirs);
    assert_eq!(
        repo.repository.ls_tree("HEAD", false)?.len(),
        3,
        "f.txt, main.txt and topic.txt"
    );

    Ok(())
}

#[rstest]
fn reopened_repositories_keep_their_object_format() -> Result<()> {
    let repo = Fixture::new(HashAlgorithm::Sha256);
    repo.commit(&[("f.txt", "x\n")], "A")?;

    let reopened = Repository::open(repo.dir.path())?;

    assert_eq!(reopened.hash_algorithm(), HashAlgorithm::Sha256);
    assert_eq!(reopened.rev_parse("HEAD")?.to_string().len(), 64);
    assert_eq!(reopened.log(None, None)?.len(), 1);

    Ok(())
}

#[rstest]
#[case::three_way(true)]
#[case::fast_forward(false)]
fn missing_objects_leave_the_repository_untouched(
    repo: Fixture,
    #[case] diverged: bool,
) -> Result<()> {
    let ours_content = if diverged { "main\n" } else { "a\n" };
    repo.commit(&[("a.txt", "a\n")], "A")?;
    repo.repository.branch("topic", None)?;
    if diverged {
        repo.commit(&[("a.txt", ours_content)], "B")?;
    }
    repo.repository.switch_head("topic")?;
    repo.commit(
        &[("a.txt", "a\n"), ("b.txt", "b\n"), ("c.txt", "c\n")],
        "C",
    )?;
    repo.repository.switch_head("main")?;
    repo.write("a.txt", ours_content);
    for added in ["b.txt", "c.txt"] {
        std::fs::remove_file(repo.dir.path().join(added)).expect("remove");
    }
    repo.repository.add(&[PathBuf::from(".")])?;

    let (_, lost) = repo
        .repository
        .ls_tree("topic", false)?
        .into_iter()
        .find(|(path, _)| path == &PathBuf::from("c.txt"))
        .expect("c.txt on topic");
    std::fs::remove_file(
        repo.repository
            .database()
            .objects_path()
            .join(lost.oid.to_path()),
    )
    .expect("remove loose object");
    let head = repo.repository.head_commit()?;
    let index_path = repo.repository.git_path().join("index");
    let index = std::fs::read(&index_path).expect("index");

    let err = repo
        .repository
        .merge("topic", &MergeOptions::new(author()))
        .unwrap_err();

    assert!(err.is_lookup_error());
    assert!(!repo.dir.path().join("b.txt").exists());
    assert!(!repo.dir.path().join("c.txt").exists());
    assert_eq!(
        std::fs::read_to_string(repo.dir.path().join("a.txt")).expect("file"),
        ours_content
    );
    assert_eq!(std::fs::read(&index_path).expect("index"), index);
    assert_eq!(repo.repository.head_commit()?, head);
    assert_eq!(repo.repository.merge_head()?, None);

    Ok(())
}

#[rstest]
fn adding_a_directory_unstages_deleted_files(repo: Fixture) -> Result<()> {
    repo.commit(
        &[("keep.txt", "k\n"), ("dir/gone.txt", "g\n"), ("dir/stay.txt", "s\n")],
        "first",
    )?;
    std::fs::remove_file(repo.dir.path().join("dir/gone.txt")).expect("remove");
    std::fs::remove_file(repo.dir.path().join("keep.txt")).expect("remove");

    repo.repository.add(&[PathBuf::from("dir")])?;

    let DiffResult::Structured(staged) = repo.repository.diff(
        None,
        None,
        true,
        &DiffOptions::default(),
        &DiffOutput::Structured,
    )?
    else {
        panic!("expected a structured diff");
    };
    let staged = staged
        .iter()
        .map(|delta| (delta.path().display().to_string(), delta.status))
        .collect::<Vec<_>>();
    // keep.txt lies outside the added directory and stays staged
    assert_eq!(
        staged,
        vec![("dir/gone.txt".to_string(), DeltaStatus::Deleted)]
    );

    Ok(())
}
