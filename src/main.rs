use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use graft::areas::repository::Repository;
use graft::artifacts::diff::delta::{Diff, DeltaStatus};
use graft::artifacts::diff::options::{DiffFilter, DiffOptions, DiffOutput, RenameDetection};
use graft::artifacts::diff::patch::Patch;
use graft::artifacts::diff::rename::LineScorer;
use graft::artifacts::diff::stat::DiffStat;
use graft::artifacts::merge::options::MergeOptions;
use graft::artifacts::objects::commit::{Commit, Signature};
use graft::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use graft::commands::porcelain::commit::commit_summary;
use graft::commands::porcelain::diff::DiffResult;
use graft::commands::porcelain::log::oneline;
use is_terminal::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "graft",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Tree diffs and three-way merges over a git object store",
    long_about = "graft reads and writes git-compatible repositories. \
    It diffs trees, the index and the working tree, walks the commit graph \
    and merges divergent histories.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
        #[arg(long, default_value = "sha1", help = "Object hash: sha1 or sha256")]
        object_format: String,
    },
    #[command(name = "add", about = "Stage files in the index")]
    Add {
        #[arg(required = true, help = "Files or directories to stage")]
        paths: Vec<PathBuf>,
    },
    #[command(
        name = "commit",
        about = "Create a new commit with the specified message",
        long_about = "This command records the index as a new commit on top of HEAD. \
        The author is read from GIT_AUTHOR_NAME, GIT_AUTHOR_EMAIL and GIT_AUTHOR_DATE."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
    },
    #[command(name = "branch", about = "List branches, or create one")]
    Branch {
        #[arg(index = 1, help = "Name of the branch to create")]
        name: Option<String>,
        #[arg(index = 2, help = "Revision the branch starts at (HEAD by default)")]
        source: Option<String>,
    },
    #[command(name = "switch", about = "Point HEAD at another branch without touching files")]
    Switch {
        #[arg(index = 1)]
        name: String,
    },
    #[command(name = "tag", about = "Create a lightweight tag")]
    Tag {
        #[arg(index = 1)]
        name: String,
        #[arg(index = 2, default_value = "HEAD")]
        revision: String,
    },
    #[command(
        name = "diff",
        about = "Show changes between trees, the index and the working tree",
        long_about = "Without revisions, compares the index with the working tree \
        (or HEAD with the index when --cached is given). One revision is compared \
        with the working tree or index; two revisions are compared with each other."
    )]
    Diff {
        #[arg(long, alias = "staged", help = "Compare against the index instead of the working tree")]
        cached: bool,
        #[arg(long, help = "Show a diffstat instead of a patch")]
        stat: bool,
        #[arg(long, help = "Show only names and status of changed files")]
        name_status: bool,
        #[arg(short = 'U', long = "unified", help = "Lines of context around changes")]
        context: Option<usize>,
        #[arg(long, help = "Only show changes of these kinds (any of ADMRT)")]
        diff_filter: Option<String>,
        #[arg(short = 'M', long = "find-renames", help = "Pair deleted and added files into renames")]
        find_renames: bool,
        #[arg(long, help = "Write the patch to this file instead of stdout")]
        output: Option<PathBuf>,
        #[arg(help = "Up to two revisions, optionally followed by -- and paths")]
        revisions: Vec<String>,
        #[arg(last = true, help = "Limit the diff to these paths")]
        paths: Vec<PathBuf>,
    },
    #[command(
        name = "merge",
        about = "Join another history into the current branch",
        long_about = "This command merges the named revision into HEAD, fast-forwarding when possible. \
        The merge commit's author is read from GIT_AUTHOR_NAME and GIT_AUTHOR_EMAIL."
    )]
    Merge {
        #[arg(index = 1)]
        revision: String,
        #[arg(short, long, help = "Message for the merge commit")]
        message: Option<String>,
        #[arg(long, help = "Stage the merge result without committing it")]
        no_commit: bool,
        #[arg(long, help = "Create a merge commit even when a fast-forward is possible")]
        no_ff: bool,
    },
    #[command(name = "merge-base", about = "Find the best common ancestor of two commits")]
    MergeBase {
        #[arg(index = 1)]
        ours: String,
        #[arg(index = 2)]
        theirs: String,
        #[arg(short, long, help = "Print every best common ancestor")]
        all: bool,
        #[arg(long, help = "Exit with 0 when the first commit is an ancestor of the second")]
        is_ancestor: bool,
    },
    #[command(
        name = "ahead-behind",
        about = "Count commits unique to each of two commits"
    )]
    AheadBehind {
        #[arg(index = 1)]
        local: String,
        #[arg(index = 2)]
        upstream: String,
    },
    #[command(name = "log", about = "Show commit history")]
    Log {
        #[arg(index = 1, help = "Revision to start from (HEAD by default)")]
        revision: Option<String>,
        #[arg(long, help = "One line per commit")]
        oneline: bool,
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,
    },
    #[command(name = "rev-parse", about = "Resolve a revision to an object id")]
    RevParse {
        #[arg(index = 1)]
        revision: String,
    },
    #[command(
        name = "cat-file",
        about = "Print the content of an object",
        long_about = "This command prints the content of an object in the repository. \
        Any revision naming the object is accepted."
    )]
    CatFile {
        #[arg(short = 'p', long, help = "The object to print")]
        revision: String,
    },
    #[command(name = "ls-tree", about = "List the contents of a tree")]
    LsTree {
        #[arg(short = 'r', help = "Recurse into subtrees")]
        recursive: bool,
        #[arg(index = 1)]
        revision: String,
    },
    #[command(
        name = "hash-object",
        about = "Hash an object and optionally write it to the object database",
        long_about = "This command hashes an object file and can write it to the object database. \
        It requires the path to the file to be specified."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let pwd = std::env::current_dir().context("cannot read the current directory")?;

    let open = || -> Result<Repository> {
        Repository::open(&pwd).with_context(|| format!("cannot open {}", pwd.display()))
    };
    let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();

    match cli.command {
        Commands::Init {
            path,
            object_format,
        } => {
            let algorithm = HashAlgorithm::try_from(object_format.as_str())?;
            let path = path.unwrap_or_else(|| pwd.clone());
            std::fs::create_dir_all(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;

            let repository = Repository::init(&path, algorithm)?;
            println!(
                "Initialized git directory at {}",
                repository.git_path().display()
            );
        }
        Commands::Add { paths } => open()?.add(&paths)?,
        Commands::Commit { message } => {
            let repository = open()?;
            let author = Signature::load_from_env().context("no author configured")?;
            let (oid, commit) = repository.commit(&message, author)?;
            let branch = repository.refs().current_branch()?;

            println!(
                "{}",
                commit_summary(branch.as_ref().map(|b| b.as_ref()), &oid, &commit)
            );
        }
        Commands::Branch { name: Some(name), source } => {
            open()?.branch(&name, source.as_deref())?;
        }
        Commands::Branch { name: None, .. } => {
            for (branch, is_current) in open()?.list_branches()? {
                match (is_current, color) {
                    (true, true) => println!("* {}", branch.short_name().green()),
                    (true, false) => println!("* {}", branch.short_name()),
                    (false, _) => println!("  {}", branch.short_name()),
                }
            }
        }
        Commands::Switch { name } => open()?.switch_head(&name)?,
        Commands::Tag { name, revision } => {
            open()?.tag(&name, &revision)?;
        }
        Commands::Diff {
            cached,
            stat,
            name_status,
            context,
            diff_filter,
            find_renames,
            output,
            revisions,
            paths,
        } => {
            let options = diff_options(context, diff_filter.as_deref(), find_renames, paths)?;
            return run_diff(
                &open()?,
                &revisions,
                cached,
                &options,
                output,
                stat,
                name_status,
                color,
            );
        }
        Commands::Merge {
            revision,
            message,
            no_commit,
            no_ff,
        } => {
            let merger = Signature::load_from_env().context("no author configured")?;
            let mut options = MergeOptions::new(merger);
            if let Some(message) = message {
                options = options.with_message(message);
            }
            if no_commit {
                options = options.without_commit();
            }
            if no_ff {
                options = options.without_fast_forward();
            }

            let result = open()?.merge(&revision, &options)?;
            for conflict in &result.conflicts {
                println!("{conflict}");
            }
            println!("{result}");
            if let Some(commit) = result.commit {
                println!("{}", commit.to_short_oid());
            }

            if result.has_conflicts {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::MergeBase {
            ours,
            theirs,
            all,
            is_ancestor,
        } => {
            let repository = open()?;
            if is_ancestor {
                let ours_oid = repository.resolve_commit(&ours)?;
                let theirs_oid = repository.resolve_commit(&theirs)?;
                let ancestor =
                    ours_oid == theirs_oid || repository.is_descendant(&theirs, &ours)?;
                return Ok(if ancestor {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                });
            }

            if all {
                for base in repository.merge_bases(&ours, &theirs)? {
                    println!("{base}");
                }
            } else {
                println!("{}", repository.merge_base(&ours, &theirs)?);
            }
        }
        Commands::AheadBehind { local, upstream } => {
            let (ahead, behind) = open()?.ahead_behind(&local, &upstream)?;
            println!("{ahead}\t{behind}");
        }
        Commands::Log {
            revision,
            oneline: one_line,
            max_count,
        } => {
            for (oid, commit) in open()?.log(revision.as_deref(), max_count)? {
                if one_line {
                    println!("{}", oneline(&oid, &commit));
                } else {
                    print_medium(&oid, &commit, color);
                }
            }
        }
        Commands::RevParse { revision } => println!("{}", open()?.rev_parse(&revision)?),
        Commands::CatFile { revision } => {
            let (_, rendered) = open()?.cat_file(&revision)?;
            print!("{rendered}");
        }
        Commands::LsTree {
            recursive,
            revision,
        } => {
            for (path, entry) in open()?.ls_tree(&revision, recursive)? {
                let kind = if entry.is_tree() { "tree" } else { "blob" };
                println!("{:0>6} {kind} {}\t{}", entry.mode.as_str(), entry.oid, path.display());
            }
        }
        Commands::HashObject { write, file } => {
            println!("{}", open()?.hash_object(&file, write)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn diff_options(
    context: Option<usize>,
    filter: Option<&str>,
    find_renames: bool,
    paths: Vec<PathBuf>,
) -> Result<DiffOptions> {
    let mut options = DiffOptions {
        paths,
        ..Default::default()
    };
    if let Some(context) = context {
        options.context_lines = context;
    }
    if let Some(filter) = filter {
        options.filter = match DiffFilter::try_parse(filter) {
            Some(filter) => filter,
            None => bail!("invalid --diff-filter '{filter}'"),
        };
    }
    if find_renames {
        options.renames = Some(RenameDetection::new(Rc::new(LineScorer)));
    }

    Ok(options)
}

#[allow(clippy::too_many_arguments)]
fn run_diff(
    repository: &Repository,
    revisions: &[String],
    cached: bool,
    options: &DiffOptions,
    output: Option<PathBuf>,
    stat: bool,
    name_status: bool,
    color: bool,
) -> Result<ExitCode> {
    let (old, new) = match revisions {
        [] => (None, None),
        [old] => (Some(old.as_str()), None),
        [old, new] => (Some(old.as_str()), Some(new.as_str())),
        _ => bail!("diff takes at most two revisions"),
    };

    let target = match output {
        Some(path) => DiffOutput::File(path),
        None => DiffOutput::Structured,
    };

    match repository.diff(old, new, cached, options, &target)? {
        DiffResult::Structured(diff) if stat => print!("{}", DiffStat::from_diff(&diff)),
        DiffResult::Structured(diff) if name_status => print_name_status(&diff),
        DiffResult::Structured(diff) => print!("{}", Patch::new(&diff).with_color(color)),
        DiffResult::Text(text) => print!("{text}"),
        DiffResult::Written(path) => tracing::info!(path = %path.display(), "patch written"),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_name_status(diff: &Diff) {
    for delta in diff {
        match (delta.status, delta.similarity) {
            (DeltaStatus::Renamed, Some(score)) => println!(
                "R{score:03}\t{}\t{}",
                display(&delta.old_path),
                display(&delta.new_path)
            ),
            (status, _) => println!("{}\t{}", status.status_char(), display(delta.path())),
        }
    }
}

fn print_medium(oid: &ObjectId, commit: &Commit, color: bool) {
    let header = format!("commit {oid}");
    if color {
        println!("{}", header.yellow());
    } else {
        println!("{header}");
    }
    if commit.parents().len() > 1 {
        let parents = commit
            .parents()
            .iter()
            .map(ObjectId::to_short_oid)
            .collect::<Vec<_>>();
        println!("Merge: {}", parents.join(" "));
    }
    println!("Author: {}", commit.author().display_name());
    println!(
        "Date:   {}",
        commit.author().timestamp().format("%a %b %-d %H:%M:%S %Y %z")
    );
    println!();
    for line in commit.message().lines() {
        println!("    {line}");
    }
    println!();
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
