//! linetag - tag the lines of a file with declarative syntax modes

use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use linetag::config::Config;
use linetag::error::{ColorizerError, Result};
use linetag::logging;
use linetag::render;
use linetag::syntax::{CommentDelims, DocumentColorizer, FixedLanguage};

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    language: Option<String>,
    modes_dir: Option<PathBuf>,
    dump: bool,
    list: bool,
    file: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Help,
    Version,
    Run(Options),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args)? {
        Action::Help => {
            print_usage();
            return Ok(());
        }
        Action::Version => {
            print_version();
            return Ok(());
        }
        Action::Run(options) => options,
    };

    let mut config = Config::load();
    logging::init(config.trace);
    if let Some(dir) = options.modes_dir.clone() {
        config.modes_dir = Some(dir);
    }
    let library = config.mode_library()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if options.list {
        for language in library.languages() {
            let delims = library
                .get(language)
                .and_then(|file| CommentDelims::from_properties(&file.properties).to_delims_string())
                .unwrap_or_default();
            writeln!(out, "{}\t{}", language, delims)?;
        }
        out.flush()?;
        return Ok(());
    }

    let path = options
        .file
        .ok_or_else(|| ColorizerError::Config("no input file".to_string()))?;
    let language = options
        .language
        .or_else(|| detect_language(&path).filter(|l| library.contains(l)))
        .or_else(|| config.default_language.clone())
        .unwrap_or_default();

    let contents = fs::read_to_string(&path)?;
    let lines: Vec<&str> = contents.lines().collect();

    let mut document = DocumentColorizer::new(library, config.colorizer_options());
    document.refresh(&FixedLanguage::new(&language));
    document.highlight(&lines)?;

    for (i, text) in lines.iter().enumerate() {
        let events = document.events(i).unwrap_or(&[]);
        if options.dump {
            render::dump_line(&mut out, i, text, events)?;
            if let Some(state) = document.state_after(i) {
                writeln!(out, "{}\tstate\t{}", i + 1, document.colorizer().describe_state(state))?;
            }
        } else if config.color_output {
            render::render_line(&mut out, text, events)?;
        } else {
            writeln!(out, "{}", text)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Action> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Action::Help),
            "--version" | "-V" => return Ok(Action::Version),
            "--language" | "-l" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ColorizerError::Config(format!("{} needs a language name", arg)))?;
                options.language = Some(value.to_lowercase());
            }
            "--modes" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ColorizerError::Config("--modes needs a directory".to_string()))?;
                options.modes_dir = Some(PathBuf::from(value));
            }
            "--dump" => options.dump = true,
            "--list" => options.list = true,
            _ if arg.starts_with('-') => {
                return Err(ColorizerError::Config(format!("unknown option '{}'", arg)));
            }
            _ => options.file = Some(PathBuf::from(arg)),
        }
    }
    Ok(Action::Run(options))
}

/// Language for a file name, from its extension
fn detect_language(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let language = match ext.as_str() {
        "rs" => "rust",
        "py" | "pyw" => "python",
        "c" | "h" => "c",
        "md" | "markdown" => "markdown",
        other => other,
    };
    Some(language.to_string())
}

fn print_usage() {
    println!("linetag {} - line-oriented syntax tagging", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: linetag [OPTIONS] FILE");
    println!();
    println!("Options:");
    println!("  -l, --language NAME  Tag FILE as NAME instead of guessing from its extension");
    println!("      --modes DIR      Load extra *.toml mode files from DIR");
    println!("      --dump           Print tagged ranges and line states instead of colors");
    println!("      --list           List known languages and their comment delimiters");
    println!("  -h, --help           Show this help message");
    println!("  -V, --version        Show version information");
    println!();
    println!("Environment:");
    println!("  {}           Log filter, e.g. linetag::driver=trace", logging::LOG_ENV);
}

fn print_version() {
    println!("linetag {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let action = parse_args(&args(&["-l", "Python", "--dump", "x.txt"])).unwrap();
        assert_eq!(
            action,
            Action::Run(Options {
                language: Some("python".to_string()),
                dump: true,
                file: Some(PathBuf::from("x.txt")),
                ..Options::default()
            })
        );
        assert_eq!(parse_args(&args(&["x", "--help"])).unwrap(), Action::Help);
        assert_eq!(parse_args(&args(&["-V"])).unwrap(), Action::Version);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(matches!(parse_args(&args(&["--bogus"])), Err(ColorizerError::Config(_))));
        assert!(matches!(parse_args(&args(&["--modes"])), Err(ColorizerError::Config(_))));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("main.rs")).as_deref(), Some("rust"));
        assert_eq!(detect_language(Path::new("a/test.PY")).as_deref(), Some("python"));
        assert_eq!(detect_language(Path::new("Cargo.toml")).as_deref(), Some("toml"));
        assert_eq!(detect_language(Path::new("no_extension")), None);
    }
}
