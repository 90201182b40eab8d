use std::path::{Path, PathBuf};

use clap::Parser;
use dabble::machine::DEFAULT_MAX_DEPTH;
use dabble::{read, Config, Machine, Value};
use miette::{IntoDiagnostic, NamedSource};
use rustyline::{
    error::ReadlineError, validate::MatchingBracketValidator, Completer, Editor, Helper,
    Highlighter, Hinter, Validator,
};

/// A tiny lisp on a tagged-word virtual machine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Evaluates every expression of a file and prints the results.
    #[arg(short, long)]
    load: Option<PathBuf>,

    /// Starts a repl session. It's the default when no file is loaded.
    #[arg(short, long)]
    repl: bool,

    /// Binds every `.lisp` file of a directory to its file name before anything else runs.
    #[arg(long)]
    lib: Option<PathBuf>,

    /// Logs every evaluation step.
    #[arg(short, long)]
    debug: bool,

    /// How many evaluations can nest before giving up with an error.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_DEPTH as u32,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_depth: u32,
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    brackets: MatchingBracketValidator,
}

fn main() -> miette::Result<()> {
    // Install the panic handler.
    bupropion::install(bupropion::BupropionHandlerOpts::new).into_diagnostic()?;

    // Parse the command line arguments.
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.debug {
        logger.filter_level(log::LevelFilter::Trace);
    }
    logger.init();

    let mut machine = Machine::with_config(Config {
        max_depth: args.max_depth as usize,
    });
    let mut env = machine.builtin_environment();

    if let Some(directory) = &args.lib {
        env = load_libraries(&mut machine, env, directory)?;
    }

    if let Some(path) = &args.load {
        run_file(&mut machine, env, path)?;
    }

    if args.repl || args.load.is_none() {
        repl(&mut machine, env)?;
    }

    Ok(())
}

fn run_file(machine: &mut Machine, env: Value, path: &Path) -> miette::Result<()> {
    let source = std::fs::read_to_string(path).into_diagnostic()?;

    let exprs = read(machine, &source).map_err(|err| {
        let name = path.display().to_string();
        miette::Report::new(err).with_source_code(NamedSource::new(name, source.clone()))
    })?;

    log::debug!("loaded {} expressions from {}", exprs.len(), path.display());

    for expr in exprs {
        let result = machine.eval(expr, env);
        println!("{}", machine.display(result));
    }

    Ok(())
}

fn load_libraries(
    machine: &mut Machine,
    mut env: Value,
    directory: &Path,
) -> miette::Result<Value> {
    let mut paths = std::fs::read_dir(directory)
        .into_diagnostic()?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()?;
    paths.retain(|path| path.extension().is_some_and(|ext| ext == "lisp"));
    paths.sort();

    for path in paths {
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            log::warn!("skipping library with a non utf-8 name: {}", path.display());
            continue;
        };

        let source = std::fs::read_to_string(&path).into_diagnostic()?;
        env = machine.load_library(env, name, &source).map_err(|err| {
            let file = path.display().to_string();
            miette::Report::new(err).with_source_code(NamedSource::new(file, source.clone()))
        })?;
    }

    Ok(env)
}

fn get_history_path() -> Option<PathBuf> {
    let home_env = std::env::var("HOME").ok()?;
    let path = format!("{home_env}/.dabble.history");
    Some(PathBuf::from(path))
}

pub fn repl(machine: &mut Machine, env: Value) -> miette::Result<()> {
    let mut rl = Editor::new().into_diagnostic()?;
    let path = get_history_path();
    let h = InputValidator {
        brackets: MatchingBracketValidator::new(),
    };

    rl.set_helper(Some(h));

    if let Some(path) = path.clone() {
        if rl.load_history(&path).is_err() {
            println!("No previous history.");
        }
    }

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                rl.add_history_entry(line.as_str()).into_diagnostic()?;

                let exprs = match read(machine, &line) {
                    Ok(exprs) => exprs,
                    Err(err) => {
                        let report = miette::Report::new(err).with_source_code(line.clone());
                        eprintln!("{report:?}");
                        continue;
                    }
                };

                for expr in exprs {
                    let result = machine.eval(expr, env);
                    println!("{}", machine.display(result));
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Bye bye...");
                break;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    if let Some(path) = path {
        let _ = rl.append_history(&path);
    }

    Ok(())
}
