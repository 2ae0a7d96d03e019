use anyhow::Result;
use bit::areas::repository::Repository;
use bit::artifacts::objects::object_type::ObjectType;
use bit::commands::plumbing::cat_file::CatFileMode;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bit",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Plumbing for a git-compatible repository store",
    long_about = "Low-level commands over a git-compatible object database, \
    staging index and references. Logging goes to stderr and is controlled by RUST_LOG.",
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
        path: Option<String>,
    },
    #[command(
        name = "cat-file",
        about = "Print the content, type or size of an object",
        long_about = "This command prints information about an object in the repository. \
        The object can be named by its full or abbreviated ID, or by a reference.",
        group(ArgGroup::new("mode").required(true).args(["pretty", "kind", "size"]))
    )]
    CatFile {
        #[arg(short = 'p', help = "Pretty-print the object content")]
        pretty: bool,
        #[arg(short = 't', help = "Print the object type")]
        kind: bool,
        #[arg(short = 's', help = "Print the object size")]
        size: bool,
        #[arg(index = 1, help = "The object to inspect")]
        object: String,
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
        #[arg(short = 't', long = "type", default_value = "blob", value_parser = parse_object_type, help = "The object type")]
        object_type: ObjectType,
        #[arg(index = 1)]
        file: String,
    },
    #[command(
        name = "rev-parse",
        about = "Resolve a name to an object ID",
        long_about = "This command resolves a reference, an abbreviated object ID or a `ref: ` value. \
        With --depth, resolution stops after that many steps and prints the value reached."
    )]
    RevParse {
        #[arg(long, help = "Maximum number of resolution steps")]
        depth: Option<usize>,
        #[arg(index = 1)]
        name: String,
    },
    #[command(name = "show-ref", about = "List references and the objects they point to")]
    ShowRef,
    #[command(name = "ls-files", about = "List the entries of the index")]
    LsFiles {
        #[arg(short, long, help = "Show mode, object ID and stage of each entry")]
        stage: bool,
    },
    #[command(
        name = "update-index",
        about = "Stage file contents into the index",
        long_about = "This command stores each file as a blob and records it in the index. \
        Files not yet tracked are only accepted with --add."
    )]
    UpdateIndex {
        #[arg(long, help = "Allow adding files not tracked yet")]
        add: bool,
        #[arg(index = 1, required = true, num_args = 1..)]
        files: Vec<String>,
    },
    #[command(name = "verify-pack", about = "Validate a pack file")]
    VerifyPack {
        #[arg(short, long, help = "List the objects of the pack")]
        verbose: bool,
        #[arg(index = 1)]
        pack: PathBuf,
    },
    #[command(
        name = "unpack-objects",
        about = "Store the objects of a pack file as loose objects"
    )]
    UnpackObjects {
        #[arg(index = 1)]
        pack: PathBuf,
    },
}

fn parse_object_type(value: &str) -> Result<ObjectType, String> {
    ObjectType::try_from(value).map_err(|err| err.to_string())
}

fn open_repository(path: &Path) -> Result<Repository> {
    Repository::open(path, Box::new(std::io::stdout()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let pwd = std::env::current_dir()?;

    match &cli.command {
        Commands::Init { path } => {
            let mut repository = match path {
                Some(path) => open_repository(&pwd.join(path))?,
                None => open_repository(&pwd)?,
            };

            repository.init()?
        }
        Commands::CatFile {
            pretty,
            kind,
            size,
            object,
        } => {
            let mode = match (*pretty, *kind, *size) {
                (true, _, _) => CatFileMode::Pretty,
                (_, true, _) => CatFileMode::Type,
                _ => CatFileMode::Size,
            };

            open_repository(&pwd)?.cat_file(mode, object)?
        }
        Commands::HashObject {
            write,
            object_type,
            file,
        } => open_repository(&pwd)?.hash_object(&pwd.join(file), *object_type, *write)?,
        Commands::RevParse { depth, name } => open_repository(&pwd)?.rev_parse(name, *depth)?,
        Commands::ShowRef => open_repository(&pwd)?.show_ref()?,
        Commands::LsFiles { stage } => open_repository(&pwd)?.ls_files(*stage)?,
        Commands::UpdateIndex { add, files } => {
            open_repository(&pwd)?.update_index(files, *add)?
        }
        Commands::VerifyPack { verbose, pack } => {
            open_repository(&pwd)?.verify_pack(&pwd.join(pack), *verbose)?
        }
        Commands::UnpackObjects { pack } => {
            open_repository(&pwd)?.unpack_objects(&pwd.join(pack))?
        }
    }

    Ok(())
}
