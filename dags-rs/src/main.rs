use std::process::ExitCode;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dags::cli::{self, CliArgs, ConfigFile, Mode};
use dags::{compress_script, pretty_script, Config, Engine};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("dags: {e}");
            eprintln!("Usage: dags [-f[<file>]] [-c<script>] [-p] [-i] [-z] [-o] [-d] [<script-file>...]");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins; -d raises the default from warn to debug.
    let default_level = if args.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut engine = load_engine(&args);
    let mut failed = false;

    // ── Inline script, then files in order ──────────────────────────────────
    let mut sources: Vec<(String, String)> = Vec::new();
    if let Some(script) = &args.script {
        sources.push(("-c".to_owned(), script.clone()));
    }
    for path in &args.files {
        match std::fs::read_to_string(path) {
            Ok(text) => sources.push((path.display().to_string(), text)),
            Err(e) => {
                eprintln!("dags: {}: {e}", path.display());
                failed = true;
            }
        }
    }

    for (name, script) in &sources {
        match args.mode {
            Mode::Run => {
                let mut out = String::new();
                engine.run_script(script, &mut out);
                print!("{out}");
                if !out.is_empty() && !out.ends_with('\n') {
                    println!();
                }
                for msg in engine.out_channel.drain(..) {
                    println!(">> {msg}");
                }
            }
            Mode::Pretty | Mode::Compress => {
                let formatted = if args.mode == Mode::Pretty {
                    pretty_script(script, args.indent)
                } else {
                    compress_script(script)
                };
                match formatted {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("dags: {name}: {e}");
                        failed = true;
                    }
                }
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Build the engine from the config file (if any) and the CLI switches.
fn load_engine(args: &CliArgs) -> Engine {
    let path = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(p) => Some(p.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };

    let mut config = Config::new();
    if let Some(path) = path {
        match Config::load_file(&path) {
            Ok((loaded, errors)) => {
                for e in &errors {
                    eprintln!("dags: {}: {e}", path.display());
                }
                config = loaded;
            }
            Err(e) => eprintln!("dags: {}: {e}", path.display()),
        }
    }

    let Config { mut options, mut store } = config;
    if args.overlay {
        options.use_overlay = true;
        store.set_use_overlay(true);
    }
    Engine::with_store(store, options)
}
