use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dbgap_harvest::convert::{HttpXmlConverter, XmlConverter};
use dbgap_harvest::error::HarvestError;
use dbgap_harvest::graph::JsonLdAssembler;
use dbgap_harvest::layout::{default_data_root, Staging};
use dbgap_harvest::pipeline::{Harvester, RunRequest};
use dbgap_harvest::remote::HttpRemoteSource;
use dbgap_harvest::study::{Mode, RunModes, StudyIdentifier};

#[derive(Parser)]
#[command(name = "dbgap-harvest")]
#[command(about = "Harvest dbGaP study descriptors into raw/json/ttl staging directories")]
#[command(version, author)]
struct Cli {
    /// Numeric dbGaP study accession (e.g. 774 for phs000774)
    #[arg(long)]
    study: u32,

    #[arg(long, default_value_t = 1)]
    study_version: u32,

    #[arg(long, default_value_t = 1)]
    participant_set: u32,

    /// Stages to run; repeatable. `all` expands to fetch+convert+graph.
    #[arg(long = "mode", value_enum, required = true)]
    modes: Vec<Mode>,

    #[arg(long, default_value = "https://ftp.ncbi.nlm.nih.gov/dbgap/studies")]
    remote_root: String,

    /// XML-to-JSON conversion service endpoint (required with convert mode)
    #[arg(long)]
    converter_url: Option<String>,

    /// Schema/context URI for graph assembly (required with graph mode)
    #[arg(long)]
    schema_uri: Option<String>,

    #[arg(long)]
    data_root: Option<Utf8PathBuf>,

    #[arg(long)]
    xml_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    json_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    ttl_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    log_file: Option<Utf8PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::InvalidStudyId(_)
        | HarvestError::EmptyRunModes
        | HarvestError::MissingSchemaUri
        | HarvestError::MissingConverterUrl => 2,
        HarvestError::RemoteUnavailable(_)
        | HarvestError::RemoteHttp(_)
        | HarvestError::RemoteStatus { .. }
        | HarvestError::ConverterHttp(_)
        | HarvestError::ConverterStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let study = StudyIdentifier::new(cli.study, cli.study_version, cli.participant_set)
        .into_diagnostic()?;
    let modes = RunModes::from_modes(&cli.modes).into_diagnostic()?;

    // Configuration errors terminate before any I/O begins.
    if modes.convert() && cli.converter_url.is_none() {
        return Err(HarvestError::MissingConverterUrl).into_diagnostic();
    }
    if modes.graph() && cli.schema_uri.is_none() {
        return Err(HarvestError::MissingSchemaUri).into_diagnostic();
    }

    let data_root = match cli.data_root {
        Some(root) => root,
        None => default_data_root().into_diagnostic()?,
    };
    let defaults = Staging::for_study(&data_root, &study);
    let staging = Staging::with_dirs(
        cli.xml_dir.unwrap_or_else(|| defaults.xml_dir().to_owned()),
        cli.json_dir.unwrap_or_else(|| defaults.json_dir().to_owned()),
        cli.ttl_dir.unwrap_or_else(|| defaults.ttl_dir().to_owned()),
    );

    let remote = HttpRemoteSource::new(&cli.remote_root).into_diagnostic()?;
    let converter = match cli.converter_url.as_deref() {
        Some(url) => AnyConverter::Http(HttpXmlConverter::new(url).into_diagnostic()?),
        None => AnyConverter::Nop,
    };

    let harvester = Harvester::new(staging, remote, converter, JsonLdAssembler);
    let report = harvester
        .run(&RunRequest {
            study,
            modes,
            schema_uri: cli.schema_uri,
        })
        .into_diagnostic()?;

    let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn init_tracing(cli: &Cli) -> miette::Result<()> {
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    match &cli.log_file {
        Some(path) => {
            let file = File::create(path.as_std_path()).into_diagnostic()?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// The conversion service is only configured when convert mode is active;
/// the fallback exists so the harvester can still be assembled for
/// fetch-only and graph-only runs.
enum AnyConverter {
    Http(HttpXmlConverter),
    Nop,
}

impl XmlConverter for AnyConverter {
    fn convert(&self, raw_xml: &str) -> Result<String, HarvestError> {
        match self {
            AnyConverter::Http(client) => client.convert(raw_xml),
            AnyConverter::Nop => Err(HarvestError::ConverterHttp(
                "converter service not configured".to_string(),
            )),
        }
    }
}
