// src/main.rs
use clap::{ArgGroup, Parser};
use pacproxy::log::{self, LogLevel};
use pacproxy::pac::helper::host_of;
use pacproxy::{Config, PacHelper, PacSource, ScriptEnvironment};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "pacproxy")]
#[command(about = "Evaluate a proxy auto-config script for a URL")]
#[command(group(ArgGroup::new("script").required(true).args(["pac", "code"])))]
struct Args {
    /// Target URL to resolve
    url: String,

    /// PAC script location: file path, file:// or http(s):// URL
    #[arg(long, short = 'p')]
    pac: Option<String>,

    /// Inline PAC script source
    #[arg(long)]
    code: Option<String>,

    /// Host passed to the script (defaults to the URL's host)
    #[arg(long)]
    host: Option<String>,

    /// Call FindProxyForURLEx instead of FindProxyForURL
    #[arg(long)]
    ex: bool,

    /// Print directives as JSON
    #[arg(long)]
    json: bool,

    /// Config file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log level, overriding the config file
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Enable debug logging (same as --log-level debug)
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn log_level(&self, config: &Config) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level.unwrap_or(config.log_level)
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default(args.config.clone())?;
    log::init(args.log_level(&config));

    let source = match (args.pac, args.code) {
        (_, Some(code)) => PacSource::code(code),
        (Some(location), None) => PacSource::location(&location),
        (None, None) => return Err("either --pac or --code is required".into()),
    };

    let env = ScriptEnvironment::from_config(&config)?;
    let mut helper = PacHelper::with_environment(&env, &source)?;

    let host = match args.host {
        Some(host) => host,
        None => host_of(&args.url)?,
    };
    let directives = if args.ex {
        helper.proxy_directives_ex(&args.url, &host)?
    } else {
        helper.proxy_directives(&args.url, &host)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&directives)?);
    } else {
        for directive in &directives {
            println!("{directive}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
