use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser as ClapParser;
use serde_json::Value;
use gaikan::{associator, lexer, Engine, Options, Template};

#[derive(clap::Parser, Debug)]
/// Compile or render HTML templates with data-* directives.
struct Args {
    /// Report anomalies in the markup, like unmatched tags, on stderr
    #[clap(long)]
    verbose: bool,

    /// Print the time spent in each compiler stage on stderr
    #[clap(long)]
    time: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print the JavaScript function body for a template
    Compile {
        file: PathBuf,

        /// Remove comments and insignificant whitespace first
        #[clap(long)]
        compress: bool,
    },

    /// Render a template with JSON data
    Render {
        file: PathBuf,

        /// File with the data as JSON (default: empty object)
        #[clap(long)]
        data: Option<PathBuf>,

        /// Directory whose *.html files can be included by their
        /// name without the suffix
        #[clap(long)]
        dir: Option<PathBuf>,

        /// Remove comments and insignificant whitespace first
        #[clap(long)]
        compress: bool,
    },

    /// Print the tokens of a template, indented by nesting
    Tokens {
        file: PathBuf,
    },
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))
}

fn template_name(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("no usable template name in path {path:?}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        gaikan::warn::set_enabled(true);
    }
    if args.time {
        gaikan::time_guard::enabled_set(true);
    }
    let mut options = Options::from_env()?;

    match args.command {
        Command::Compile { file, compress } => {
            options.compress |= compress;
            let source = read(&file)?;
            print!("{}", Template::compile(&source, &options).to_js());
        }
        Command::Render { file, data, dir, compress } => {
            options.compress |= compress;
            let data: Value = match data {
                Some(path) => serde_json::from_str(&read(&path)?)
                    .with_context(|| format!("parsing JSON from {path:?}"))?,
                None => Value::Object(Default::default()),
            };
            let engine = Engine::new(options);
            if let Some(dir) = dir {
                let entries = std::fs::read_dir(&dir)
                    .with_context(|| format!("reading directory {dir:?}"))?;
                for entry in entries {
                    let path = entry?.path();
                    if path.extension().map_or(false, |e| e == "html") {
                        engine.add(template_name(&path)?, &read(&path)?);
                    }
                }
            }
            let name = template_name(&file)?;
            engine.add(name, &read(&file)?);
            let out = engine.render(name, &data)
                .with_context(|| format!("rendering {file:?}"))?;
            print!("{out}");
        }
        Command::Tokens { file } => {
            let source = read(&file)?;
            let mut tokens = lexer::lex(&source);
            associator::associate(&mut tokens);
            let depths = associator::depths(&tokens);
            for (token, depth) in tokens.iter().zip(depths) {
                println!("{}{:?} {:?}", "  ".repeat(depth), token.kind, token.text(&source));
            }
        }
    }
    Ok(())
}
