use clap::{Arg, ArgAction, ArgMatches, Command};
use csv_nested_ingest::config::{DATABASE_ENV, DEFAULT_DATABASE, DEFAULT_MAX_LINE_LEN, SOURCE_ENV};
use csv_nested_ingest::report::write_report;
use csv_nested_ingest::{
    check_source, ingest, preview, IngestOutcome, IngestResult, Response, SourceConfig, UserStore,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cli() -> Command {
    Command::new("ingest")
        .about("Load a dot-path CSV file into the users table and report the age distribution")
        .subcommand_required(true)
        .arg(
            Arg::new("source")
                .long("source")
                .env(SOURCE_ENV)
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("CSV file to read (.csv, .csv.gz or .csv.zst)"),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .global(true)
                .default_value(",")
                .help("Field delimiter; use \\t for tabs"),
        )
        .arg(
            Arg::new("encoding")
                .long("encoding")
                .global(true)
                .default_value("utf-8")
                .help("Character encoding label of the file, e.g. latin1"),
        )
        .arg(
            Arg::new("max-line-len")
                .long("max-line-len")
                .global(true)
                .value_parser(clap::value_parser!(usize))
                .help("Lines longer than this many bytes are skipped [default: 1 MiB]"),
        )
        .subcommand(
            Command::new("upload")
                .about("Parse, persist every record, then print the distribution")
                .arg(
                    Arg::new("database")
                        .long("database")
                        .env(DATABASE_ENV)
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value(DEFAULT_DATABASE),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .help("Also print the distribution as a CSV table on stderr")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("preview").about("Parse only and print the records as JSON"))
}

fn source_config(matches: &ArgMatches) -> IngestResult<SourceConfig> {
    let base = SourceConfig {
        path: matches.get_one::<PathBuf>("source").cloned(),
        ..Default::default()
    };
    base.with_delimiter(matches.get_one::<String>("delimiter").map_or(",", |s| s.as_str()))?
        .with_charset(matches.get_one::<String>("encoding").map_or("utf-8", |s| s.as_str()))?
        .with_max_line_len(
            matches
                .get_one::<usize>("max-line-len")
                .copied()
                .unwrap_or(DEFAULT_MAX_LINE_LEN),
        )
}

async fn run_upload(matches: &ArgMatches) -> IngestResult<Response> {
    let result = upload(matches).await;
    if let (Ok(IngestOutcome::Loaded { distribution, .. }), true) =
        (&result, matches.get_flag("report"))
    {
        write_report(distribution, tokio::io::stderr()).await?;
    }
    Response::upload(result)
}

async fn upload(matches: &ArgMatches) -> IngestResult<IngestOutcome> {
    let config = source_config(matches)?;
    let database = matches
        .get_one::<PathBuf>("database")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
    // fail on a bad source before creating the database file
    check_source(&config).await?;
    let store = UserStore::open(&database)?;
    ingest(&config, &store).await
}

async fn run_preview(matches: &ArgMatches) -> IngestResult<Response> {
    let result = match source_config(matches) {
        Ok(config) => preview(&config).await,
        Err(e) => Err(e),
    };
    Response::preview(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csv_nested_ingest=info,ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = cli().get_matches();
    let response = match matches.subcommand() {
        Some(("upload", sub)) => run_upload(sub).await?,
        Some(("preview", sub)) => run_preview(sub).await?,
        _ => unreachable!("clap enforces a subcommand"),
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    std::process::exit(response.outcome.exit_code());
}
