mod config;
mod db;
mod import;
mod level;
mod normalize;
mod search;
mod update;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};

use config::Config;
use db::{Database, Member};
use import::workbook::SourceFormat;
use import::ImportOptions;
use update::{parse_assignment, MemberPatch};

#[derive(Parser, Debug)]
#[command(name = "roster", about = "Member roster import and directory")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init(InitArgs),
    /// Replace the member table with the contents of a roster export
    Import(ImportArgs),
    /// List members, optionally filtered by name, email, phone or board contact
    List(ListArgs),
    /// Show one member
    Show(ShowArgs),
    /// Change fields of one member
    Update(UpdateArgs),
    /// List membership levels
    Levels(LevelsArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Database location written into the new configuration
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Overwrite an existing configuration
    #[arg(long, default_value_t = false)]
    force: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Input format; guessed from the file extension when omitted
    #[arg(long, value_enum)]
    format: Option<ImportFormat>,

    /// Worksheet to read (overrides the configured sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Print normalized records as JSON without touching the database
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Number of threads for row normalization.
    /// Defaults to number of CPU cores.
    #[arg(long, short = 'j')]
    threads: Option<usize>,

    #[arg(value_name = "PATH")]
    input: PathBuf,
}

#[derive(Clone, Debug, ValueEnum)]
enum ImportFormat {
    Workbook,
    Csv,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Search term (matches first/last name, email, phone, board contact)
    #[arg(long, short = 's')]
    search: Option<String>,

    /// Print full rows as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    id: i64,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: i64,

    /// Column assignment such as `tickets_apr=2` (repeatable)
    #[arg(long = "set", value_name = "COLUMN=VALUE")]
    set: Vec<String>,

    /// JSON object of column values, applied before --set
    #[arg(long, value_name = "JSON")]
    data: Option<String>,
}

#[derive(Args, Debug)]
struct LevelsArgs {
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Cli {
        config: config_path,
        command,
    } = Cli::parse();
    let load = || config::load(config_path.as_deref());

    match command {
        Command::Init(args) => handle_init(&args, config_path.as_deref()),
        Command::Import(args) => handle_import(args, &load()?),
        Command::List(args) => handle_list(args, &load()?),
        Command::Show(args) => handle_show(args, &load()?),
        Command::Update(args) => handle_update(args, &load()?),
        Command::Levels(args) => handle_levels(args, &load()?),
    }
}

fn handle_init(args: &InitArgs, config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => config::default_config_path()?,
    };
    let db_path = match &args.db {
        Some(p) => p.clone(),
        None => config::default_db_path()?,
    };

    config::write_default(&path, &db_path, args.force)?;
    println!("Initialized roster configuration at {}", path.display());
    println!("Database: {}", db_path.display());
    Ok(())
}

fn handle_import(args: ImportArgs, config: &Config) -> Result<()> {
    if let Some(num_threads) = args.threads {
        if num_threads == 0 {
            bail!("--threads must be at least 1");
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if pool already initialized
    }

    log::info!(
        "importing {} using {}",
        args.input.display(),
        config.config_path.display()
    );

    let format = match args.format {
        Some(ImportFormat::Workbook) => SourceFormat::Workbook,
        Some(ImportFormat::Csv) => SourceFormat::Csv,
        None => SourceFormat::detect(&args.input),
    };
    let options = ImportOptions {
        format,
        sheet: args.sheet.as_deref(),
        dry_run: args.dry_run,
    };

    if args.dry_run {
        let result = import::import_roster(&args.input, &options, config, None)?;
        println!("{}", serde_json::to_string_pretty(&result.records)?);
        log::info!(
            "dry run: {} rows normalized, {} skipped; database unchanged",
            result.records.len(),
            result.skipped
        );
        return Ok(());
    }

    let mut db = Database::open(&config.db_path)?;
    let result = import::import_roster(&args.input, &options, config, Some(&mut db))?;

    log::info!("replaced member table from sheet '{}'", result.sheet);
    println!("Imported {} rows into member table.", result.imported);
    if result.skipped > 0 {
        println!(
            "Skipped {} rows without a first or last name.",
            result.skipped
        );
    }
    Ok(())
}

fn handle_list(args: ListArgs, config: &Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let members = db.list_members(args.search.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }

    if members.is_empty() {
        match args.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(q) => println!("No matches for \"{}\"", q),
            None => println!("No members"),
        }
        return Ok(());
    }

    // id<TAB>last<TAB>first<TAB>level<TAB>phone<TAB>email
    for m in &members {
        println!("{}", list_line(m));
    }
    Ok(())
}

fn list_line(m: &Member) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}{}",
        m.id,
        field(&m.lastname),
        field(&m.firstname),
        field(&m.membership_level),
        field(&m.phone),
        field(&m.email),
        if m.active { "" } else { "\tinactive" }
    )
}

fn handle_show(args: ShowArgs, config: &Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let Some(member) = db.get_member(args.id)? else {
        bail!("member {} not found", args.id);
    };
    println!("{}", serde_json::to_string_pretty(&member)?);
    Ok(())
}

fn handle_update(args: UpdateArgs, config: &Config) -> Result<()> {
    let mut data = match args.data.as_deref() {
        Some(raw) => serde_json::from_str::<Value>(raw).context("--data is not valid JSON")?,
        None => Value::Object(Map::new()),
    };
    if let Value::Object(fields) = &mut data {
        for assignment in &args.set {
            let (key, value) = parse_assignment(assignment)?;
            fields.insert(key, value);
        }
    }

    let patch = MemberPatch::from_json(&data)?;

    let mut db = Database::open(&config.db_path)?;
    let Some(member) = db.update_member(args.id, &patch)? else {
        bail!("member {} not found", args.id);
    };
    println!("{}", serde_json::to_string_pretty(&member)?);
    Ok(())
}

fn handle_levels(args: LevelsArgs, config: &Config) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let levels = db.membership_levels()?;
    if args.json {
        println!("{}", serde_json::to_string(&levels)?);
    } else {
        for level in levels {
            println!("{}", level);
        }
    }
    Ok(())
}
