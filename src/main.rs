use clap::{Parser, Subcommand};
use source_locator::markup::{self, count_lines, highlight::highlight};
use source_locator::{Config, DebugMap, SourceTree};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "locator")]
#[command(about = "Inspect server pages and map generated classes back to their sources")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML config with source roots, naming conventions and strata
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the node list of a page as JSON
    Lex {
        file: PathBuf,
        /// Source charset (default: from config, else UTF-8)
        #[arg(long)]
        charset: Option<String>,
    },
    /// Classify every line of a page
    Lines {
        file: PathBuf,
        #[arg(long)]
        charset: Option<String>,
    },
    /// Print highlight spans of a page as JSON
    Highlight {
        file: PathBuf,
        #[arg(long)]
        charset: Option<String>,
    },
    /// Decode a debug map
    Smap { file: PathBuf },
    /// Map a generated line back to its source
    Resolve {
        /// Fully qualified class name
        class_name: String,
        #[arg(long)]
        line: u32,
        /// Compiled class file (debug attributes, sidecar .smap)
        #[arg(long)]
        class_file: Option<PathBuf>,
        /// Debug map file, used instead of the class file's
        #[arg(long)]
        smap: Option<PathBuf>,
        /// Source root to search (repeatable; added to the config's roots)
        #[arg(long = "root")]
        roots: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| fail(&format!("{}: {}", e.kind().as_str(), e))),
        None => Config::default(),
    };

    match cli.command {
        Commands::Lex { file, charset } => {
            let document = parse_page(&file, charset.as_deref().unwrap_or(&config.charset));
            print_json(&document.nodes);
        }
        Commands::Lines { file, charset } => {
            let document = parse_page(&file, charset.as_deref().unwrap_or(&config.charset));
            print_lines(&document);
        }
        Commands::Highlight { file, charset } => {
            let document = parse_page(&file, charset.as_deref().unwrap_or(&config.charset));
            print_json(&highlight(&document.source_text()));
        }
        Commands::Smap { file } => decode_smap(&file),
        Commands::Resolve { class_name, line, class_file, smap, roots } => {
            resolve(config, &class_name, line, class_file.as_deref(), smap.as_deref(), roots);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("source_locator=debug,locator=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn read(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| fail(&format!("{}: {}", path.display(), e)))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(&e.to_string()),
    }
}

fn parse_page(path: &Path, charset: &str) -> markup::Document {
    let bytes = read(path);
    markup::parse(&bytes, charset).unwrap_or_else(|e| fail(&format!("{}: {}", e.kind().as_str(), e)))
}

fn print_lines(document: &markup::Document) {
    print!("{}", count_lines(document).to_listing());
}

fn decode_smap(path: &Path) {
    let text = String::from_utf8_lossy(&read(path)).into_owned();
    match DebugMap::decode(&text) {
        Ok(map) => print!("{}", map.to_listing()),
        Err(e) => {
            let filename = path.display().to_string();
            if io::stderr().is_terminal() {
                eprint!("{}", e.render_color(&text, &filename));
            } else {
                eprint!("{}", e.render(&text, &filename));
            }
            std::process::exit(1);
        }
    }
}

fn resolve(
    mut config: Config,
    class_name: &str,
    line: u32,
    class_file: Option<&Path>,
    smap: Option<&Path>,
    roots: Vec<PathBuf>,
) {
    config.source_roots.extend(roots);
    let tree: SourceTree = config.source_tree();
    debug!(files = tree.len(), "source index ready");
    let resolver = config.resolver(&tree);

    let location = match (smap, class_file) {
        (Some(smap), class_file) => {
            let blob = String::from_utf8_lossy(&read(smap)).into_owned();
            let bytes = class_file.map(read);
            resolver.resolve(class_name, line, Some(&blob), bytes.as_deref())
        }
        (None, Some(class_file)) => resolver.resolve_class_file(class_name, line, class_file),
        (None, None) => resolver.resolve(class_name, line, None, None),
    };

    match location {
        Some(location) => print_json(&location),
        None => fail(&format!("could not resolve {}:{}", class_name, line)),
    }
}
