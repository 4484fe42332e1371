use anyhow::Context;
use clap::{CommandFactory, Parser};
use gi_bindgen::Config;
use std::path::{Path, PathBuf};

macro_rules! errexit {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{ eprintln!($fmt $(, $arg)*); std::process::exit(1); }}
}

/// Generate dbus-glib service-side GInterfaces from D-Bus introspection XML.
#[derive(Parser)]
#[command(name = "gen")]
#[command(override_usage = "gen [OPTIONS] XMLFILE Prefix_")]
struct Cli {
    /// Introspection XML describing the interfaces
    xmlfile: Option<PathBuf>,

    /// Prefix for generated identifiers, ending in '_' (e.g. Tp_Svc_)
    prefix: Option<String>,

    /// Basename for the output files (default: lowercased prefix + "ginterfaces")
    #[arg(long, value_name = "BASENAME")]
    filename: Option<String>,

    /// Prefix for generated signal marshallers (default: lowercased prefix without trailing '_')
    #[arg(long, value_name = "PREFIX")]
    signal_marshal_prefix: Option<String>,

    /// Include an extra header in the generated .c file, as '<header.h>' or '"header.h"' (repeatable)
    #[arg(long, value_name = "HEADER")]
    include: Vec<String>,

    /// Like --include, but placed after all generated code (repeatable)
    #[arg(long, value_name = "HEADER")]
    include_end: Vec<String>,

    /// Call `void SYMBOL (DBusGMethodInvocation *context)` for methods with no implementation
    #[arg(long, value_name = "SYMBOL")]
    not_implemented_func: Option<String>,

    /// Generate interfaces marked causes-havoc instead of refusing to
    #[arg(long)]
    allow_unstable: bool,
}

fn usage() -> ! {
    println!("{}", Cli::command().render_long_help());
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let (Some(xmlfile), Some(prefix)) = (cli.xmlfile.clone(), cli.prefix.clone()) else {
        usage()
    };
    if let Err(err) = run(&cli, &xmlfile, &prefix) {
        errexit!("error: {err:#}")
    }
}

fn config(cli: &Cli, prefix: &str) -> anyhow::Result<Config> {
    let mut config = Config::new(prefix)?.with_allow_unstable(cli.allow_unstable);
    if let Some(basename) = &cli.filename {
        config = config.with_basename(basename);
    }
    if let Some(marshal_prefix) = &cli.signal_marshal_prefix {
        config = config.with_signal_marshal_prefix(marshal_prefix)?;
    }
    for header in &cli.include {
        config = config.with_include(header);
    }
    for header in &cli.include_end {
        config = config.with_include_end(header);
    }
    if let Some(func) = &cli.not_implemented_func {
        config = config.with_not_implemented_func(func);
    }
    Ok(config)
}

fn run(cli: &Cli, xmlfile: &Path, prefix: &str) -> anyhow::Result<()> {
    let config = config(cli, prefix)?;
    let xml = std::fs::read_to_string(xmlfile)
        .with_context(|| format!("read {}", xmlfile.display()))?;
    let output = gi_bindgen::generate_from_xml(&xml, &config)
        .with_context(|| format!("generate from {}", xmlfile.display()))?;

    // nothing is written unless generation succeeded for every node
    let header = format!("{}.h", config.basename());
    let body = format!("{}.c", config.basename());
    std::fs::write(&header, &output.header).with_context(|| format!("write {header}"))?;
    tracing::info!(path = %header, "wrote header");
    std::fs::write(&body, &output.body).with_context(|| format!("write {body}"))?;
    tracing::info!(path = %body, "wrote body");
    Ok(())
}
