use anyhow::{anyhow, bail, Context, Result};
use chrono::Datelike;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::Path;

use college_predictor::analyzer::AdmissionAnalyzer;
use college_predictor::catalog::{self, CollegeFilter, SortOrder};
use college_predictor::config::Config;
use college_predictor::datastore::{Datastore, MemoryDatastore, RestDatastore};
use college_predictor::import::mapping::parse_override;
use college_predictor::import::reference::{
    load_reference_maps, ReferenceEntry, ReferenceMaps, ReferenceState,
};
use college_predictor::import::{ImportSession, InputFormat};
use college_predictor::logging::{init_logging, LogConfig, LogFormat};
use college_predictor::models::{CollegeRecord, CollegeType, ExamType, PredictionInput};
use college_predictor::report;
use college_predictor::scraper::{scraped_table, ScrapeClient};

fn cli() -> Command {
    Command::new("college-predictor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Predicts admission chances and imports exam cutoff data")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("More diagnostic output (-v debug, -vv trace)")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("pretty, compact or json")
                .default_value("pretty")
                .global(true),
        )
        .subcommand(
            Command::new("predict")
                .about("Estimate a rank and list Safe / Moderate / Ambitious colleges")
                .arg(Arg::new("exam").long("exam").value_name("EXAM").help("jee-main, jee-advanced, neet or wbjee"))
                .arg(Arg::new("percentile").long("percentile").value_name("P"))
                .arg(Arg::new("score").long("score").value_name("SCORE"))
                .arg(Arg::new("category").long("category").default_value("general"))
                .arg(Arg::new("state").long("state").value_name("STATE").default_value(""))
                .arg(Arg::new("gender").long("gender"))
                .arg(
                    Arg::new("csv")
                        .long("csv")
                        .action(ArgAction::SetTrue)
                        .help("Also write predictions.csv to the output directory"),
                ),
        )
        .subcommand(
            Command::new("colleges")
                .about("Browse the college catalog")
                .arg(Arg::new("search").long("search").short('s'))
                .arg(Arg::new("type").long("type").help("government, private or deemed"))
                .arg(Arg::new("location").long("location"))
                .arg(Arg::new("min-rating").long("min-rating"))
                .arg(Arg::new("sort").long("sort").help("rating or name")),
        )
        .subcommand(
            Command::new("import")
                .about("Import cutoff rows from a CSV/TSV, JSON or HTML file")
                .arg(Arg::new("file").required(true))
                .arg(Arg::new("format").long("format").help("csv, json or html (default: from extension)"))
                .arg(
                    Arg::new("map")
                        .long("map")
                        .value_name("FIELD=HEADER")
                        .action(ArgAction::Append)
                        .help("Override the guessed column for a field"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Validate only, do not insert"),
                ),
        )
        .subcommand(
            Command::new("scrape")
                .about("Fetch cutoffs through the scrape endpoint and import them")
                .arg(Arg::new("url").required(true))
                .arg(Arg::new("year").long("year"))
                .arg(Arg::new("dry-run").long("dry-run").action(ArgAction::SetTrue)),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let verbosity = matches.get_count("verbose");
    let log_format: LogFormat = matches
        .get_one::<String>("log-format")
        .map(|f| f.parse())
        .transpose()
        .map_err(|e: String| anyhow!(e))?
        .unwrap_or_default();
    init_logging(&LogConfig::from_verbosity(verbosity).with_format(log_format));

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let Some(mut config) = Config::load_or_init(config_file)? else {
        println!("📝 Created default configuration file: {}", config_file);
        println!("⚠️  Please edit {} and run again. Set datastore_url (and the key via COLLEGE_PREDICTOR_DATASTORE_KEY) to enable imports.", config_file);
        return Ok(());
    };
    config.apply_env_overrides();

    match matches.subcommand() {
        Some(("predict", args)) => run_predict(&config, args),
        Some(("colleges", args)) => run_colleges(&config, args),
        Some(("import", args)) => run_import(&config, args).await,
        Some(("scrape", args)) => run_scrape(&config, args).await,
        _ => unreachable!("subcommand_required"),
    }
}

fn load_catalog(config: &Config) -> Result<Vec<CollegeRecord>> {
    match &config.colleges_file {
        Some(path) => catalog::load_colleges(path),
        None => Ok(catalog::builtin_colleges()),
    }
}

fn run_predict(config: &Config, args: &ArgMatches) -> Result<()> {
    let exam = match args.get_one::<String>("exam") {
        Some(raw) => raw.parse::<ExamType>().map_err(|e| anyhow!(e))?,
        None => config.default_exam,
    };
    let text = |name: &str| args.get_one::<String>(name).map(String::as_str).unwrap_or("");

    let mut input = PredictionInput::from_form(exam, text("score"), text("percentile"), text("category"), text("state"));
    input.gender = args.get_one::<String>("gender").cloned();

    let colleges = load_catalog(config)?;
    let tiers = AdmissionAnalyzer::new(&colleges).analyze(&input);
    report::print_prediction_summary(&input, &tiers);

    if args.get_flag("csv") && !tiers.is_empty() {
        let path = report::write_predictions_csv(&tiers, &config.output_directory())?;
        println!("📄 Predictions written to {}", path.display());
    }
    Ok(())
}

fn run_colleges(config: &Config, args: &ArgMatches) -> Result<()> {
    let colleges = load_catalog(config)?;

    let college_type = args
        .get_one::<String>("type")
        .map(|t| t.parse::<CollegeType>())
        .transpose()
        .map_err(|e| anyhow!(e))?;
    let min_rating = args
        .get_one::<String>("min-rating")
        .map(|r| r.parse::<f32>())
        .transpose()
        .context("--min-rating must be a number")?;
    let sort = match args.get_one::<String>("sort").map(String::as_str) {
        None => SortOrder::Catalog,
        Some("rating") => SortOrder::RatingDesc,
        Some("name") => SortOrder::Name,
        Some(other) => bail!("unknown sort order: {other}"),
    };

    let filter = CollegeFilter {
        search: args.get_one::<String>("search").cloned(),
        college_type,
        location: args.get_one::<String>("location").cloned(),
        min_rating,
        sort,
    };
    report::print_colleges(&filter.apply(&colleges));
    Ok(())
}

fn read_reference_file(path: &Path) -> Result<Vec<ReferenceEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid reference JSON in {}", path.display()))
}

/// Reference maps from local dumps when configured, else from the datastore.
async fn reference_state(config: &Config, store: Option<&RestDatastore>) -> Result<ReferenceState> {
    if let (Some(colleges), Some(branches)) = (&config.reference_colleges_file, &config.reference_branches_file) {
        let maps = ReferenceMaps::from_entries(&read_reference_file(colleges)?, &read_reference_file(branches)?);
        return Ok(ReferenceState::Loaded(maps));
    }
    match store {
        Some(store) => Ok(load_reference_maps(store).await),
        None => bail!("no reference tables: configure the datastore or reference_*_file paths"),
    }
}

async fn finish_import<D: Datastore>(mut session: ImportSession, store: &D, dry_run: bool) -> Result<()> {
    let preview = session.validate()?;
    report::print_reconciliation(&preview);

    if dry_run {
        println!("🧪 Dry run, nothing inserted");
        return Ok(());
    }

    let inserted = session.submit(store).await?;
    println!("✅ Imported {} cutoff records", inserted);
    Ok(())
}

async fn run_import(config: &Config, args: &ArgMatches) -> Result<()> {
    let file = args
        .get_one::<String>("file")
        .ok_or_else(|| anyhow!("missing input file"))?;
    let path = Path::new(file);
    let format = match args.get_one::<String>("format") {
        Some(raw) => raw.parse::<InputFormat>().map_err(|e| anyhow!(e))?,
        None => InputFormat::from_extension(path.extension().and_then(|e| e.to_str()).unwrap_or("")),
    };
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let dry_run = args.get_flag("dry-run");

    let store = if config.has_datastore() {
        Some(RestDatastore::from_config(config)?)
    } else {
        None
    };
    let references = reference_state(config, store.as_ref()).await?;

    let mut session = ImportSession::new(references);
    let table = session.load_text(&text, format)?;
    println!("📂 Parsed {} rows with columns: {}", table.rows.len(), table.headers.join(", "));

    for spec in args.get_many::<String>("map").into_iter().flatten() {
        let (field, header) = parse_override(spec)?;
        session.set_mapping(field, &header)?;
    }
    for (field, header) in session.mapping().iter() {
        println!("   {} <- {}", field.label(), header);
    }

    match store {
        Some(store) => finish_import(session, &store, dry_run).await,
        None if dry_run => finish_import(session, &MemoryDatastore::new(), true).await,
        None => bail!("datastore is not configured; rerun with --dry-run to validate only"),
    }
}

async fn run_scrape(config: &Config, args: &ArgMatches) -> Result<()> {
    let url = args.get_one::<String>("url").ok_or_else(|| anyhow!("missing url"))?;
    let year = match args.get_one::<String>("year") {
        Some(raw) => raw.parse::<i32>().context("--year must be a number")?,
        None => chrono::Local::now().year(),
    };
    let endpoint = config
        .scrape_endpoint
        .as_deref()
        .ok_or_else(|| anyhow!("scrape_endpoint is not configured"))?;
    let dry_run = args.get_flag("dry-run");

    let client = ScrapeClient::new(endpoint, config.datastore_key.as_deref());
    let cutoffs = client.fetch_cutoffs(url, year).await?;
    println!("🌐 Scraped {} cutoff rows", cutoffs.len());

    let store = if config.has_datastore() {
        Some(RestDatastore::from_config(config)?)
    } else {
        None
    };
    let references = reference_state(config, store.as_ref()).await?;

    let (table, mapping) = scraped_table(&cutoffs);
    let mut session = ImportSession::new(references);
    session.load_table(table, Some(mapping));

    match store {
        Some(store) => finish_import(session, &store, dry_run).await,
        None => finish_import(session, &MemoryDatastore::new(), true).await,
    }
}
