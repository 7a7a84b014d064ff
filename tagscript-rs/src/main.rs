use std::io::Read;
use std::process::ExitCode;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tagscript::cli::{self, CliArgs, ConfigFile, Input};
use tagscript::config::Config;
use tagscript::script::bind::{Formal, Formals};
use tagscript::script::{Engine, Function, FunctionPackage, Scenario, Value};

const LOG_ENV: &str = "TAGSCRIPT_LOG";

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tagscript: {e}");
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    init_tracing(args.debug);

    let config = load_config(&args.config);
    let mut engine = config.engine();
    install_cli_package(&mut engine);

    if let Some(src) = &args.element {
        return show_element(&mut engine, src);
    }

    let text = match read_input(&args) {
        Ok(Some(t)) => t,
        Ok(None) => {
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("tagscript: {e}");
            return ExitCode::FAILURE;
        }
    };

    let scenario = match engine.parse_script(&text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tagscript: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.play {
        play(&mut engine, &scenario)
    } else {
        list(&scenario);
        ExitCode::SUCCESS
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(spec: &ConfigFile) -> Config {
    let path = match spec {
        ConfigFile::Skip => return Config::new(),
        ConfigFile::Explicit(path) => Some(path.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };
    let Some(path) = path else {
        return Config::new();
    };
    match Config::load_file(&path) {
        Ok((config, errors)) => {
            for e in &errors {
                eprintln!("tagscript: {}: {e}", path.display());
            }
            config
        }
        Err(e) => {
            eprintln!("tagscript: warning: {}: {e}", path.display());
            Config::new()
        }
    }
}

/// Presentation actions only the command-line player understands.
fn install_cli_package(engine: &mut Engine) {
    let package = FunctionPackage::new("cli")
        .with(Function::native("br", Formals::default(), |_, _| Ok(Value::Str("\n".into()))))
        .with(Function::native("wait", Formals::new(vec![Formal::rest("args")]), |_, _| {
            Ok(Value::Void)
        }));
    let installed = engine
        .import_package(&package, "cli")
        .and_then(|()| engine.use_package("cli"));
    if let Err(e) = installed {
        tracing::warn!(error = %e, "cli package not installed");
    }
}

fn read_input(args: &CliArgs) -> std::io::Result<Option<String>> {
    match &args.input {
        Input::None => Ok(None),
        Input::Stdin => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s)?;
            Ok(Some(s))
        }
        Input::File(path) => std::fs::read_to_string(path).map(Some),
    }
}

fn show_element(engine: &mut Engine, src: &str) -> ExitCode {
    let value = match engine.parse_element(src) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("tagscript: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("{}: {value}", value.kind());
    ExitCode::SUCCESS
}

fn list(scenario: &Scenario) {
    println!("units: {}, labels: {}", scenario.len(), scenario.labels().len());
    for (i, unit) in scenario.units().iter().enumerate() {
        println!("{i:4}  {unit}");
    }
    for label in scenario.labels() {
        if label.title().is_empty() {
            println!("label {} -> {}", label.id(), label.index());
        } else {
            println!("label {} -> {} ({})", label.id(), label.index(), label.title());
        }
    }
}

fn play(engine: &mut Engine, scenario: &Scenario) -> ExitCode {
    let mut failed = 0;
    let mut out = String::new();
    for (unit, result) in scenario.units().iter().zip(engine.play(scenario)) {
        out.push_str(unit.text());
        match result {
            Ok(value) => out.push_str(&value.to_string()),
            Err(e) => {
                failed += 1;
                eprintln!("tagscript: {}: {e}", unit.action());
            }
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    print!("{out}");
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
