//! k2geo: CLI tool for querying, dumping, building, and updating QQWry databases.

use clap::{Parser, Subcommand, ValueEnum};
use k2geo::binary::IndexStrategy;
use k2geo::text::{build_database, parse_ranges, write_ranges};
use k2geo::{CacheConfig, Database, GeoReader, ReaderConfig, Updater};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "k2geo")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "IPv4 geolocation over QQWry-format databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexArg {
    /// Binary search the file on every query
    OnDisk,
    /// Unpack the index once at load time
    Materialized,
}

impl From<IndexArg> for IndexStrategy {
    fn from(arg: IndexArg) -> Self {
        match arg {
            IndexArg::OnDisk => IndexStrategy::OnDisk,
            IndexArg::Materialized => IndexStrategy::Materialized,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more addresses
    Lookup {
        /// Database file
        #[arg(short, long)]
        db: PathBuf,

        /// Index strategy
        #[arg(short, long, value_enum, default_value = "on-disk")]
        index: IndexArg,

        /// Dotted-quad IPv4 addresses
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Print database summary
    Info {
        /// Database file
        #[arg(short, long)]
        db: PathBuf,
    },

    /// Dump every range as text
    Dump {
        /// Database file
        #[arg(short, long)]
        db: PathBuf,

        /// Print each range as CIDR blocks instead of begin/end
        #[arg(long)]
        cidr: bool,
    },

    /// Build a database from a text dump
    Build {
        /// Input text dump
        #[arg(short, long)]
        input: PathBuf,

        /// Output database file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Download and install the latest database
    Update {
        /// Output database file
        #[arg(short, long, default_value = "qqwry.dat")]
        output: PathBuf,

        /// Update even if the installed copy is recent
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Lookup {
            db,
            index,
            addresses,
        } => lookup(&db, index.into(), &addresses),
        Commands::Info { db } => info(&db),
        Commands::Dump { db, cidr } => dump(&db, cidr),
        Commands::Build { input, output } => build(&input, &output),
        Commands::Update { output, force } => update(&output, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn lookup(
    db: &Path,
    strategy: IndexStrategy,
    addresses: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ReaderConfig::default()
        .with_strategy(strategy)
        .with_cache(CacheConfig::default());
    let reader = GeoReader::with_config(config);
    reader.load_file(db)?;

    for address in addresses {
        match reader.lookup(address)? {
            Some(record) => println!("{}\t{}", address, record),
            None => println!("{}\tnot found", address),
        }
    }
    Ok(())
}

fn info(db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let database = Database::open(db, IndexStrategy::OnDisk)?;
    let image = database.image();

    println!("File:     {:?}", db);
    println!("Size:     {} bytes", image.len());
    println!("Index:    {:#x} - {:#x}", image.index_begin(), image.index_end());
    println!("Segments: {}", database.segment_count());
    if let Some(version) = database.last_entry() {
        println!("Version:  {}", version);
    }
    Ok(())
}

fn dump(db: &Path, cidr: bool) -> Result<(), Box<dyn std::error::Error>> {
    let database = Database::open(db, IndexStrategy::OnDisk)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cidr {
        for segment in database.segments() {
            let record = database.record(&segment);
            for net in segment.subnets() {
                writeln!(out, "{}\t{}", net, record)?;
            }
        }
        out.flush()?;
    } else {
        let count = write_ranges(&database, out)?;
        log::info!("Dumped {} ranges", count);
    }
    Ok(())
}

fn build(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::open(input)?;
    let ranges = parse_ranges(BufReader::new(file))?;
    let data = build_database(&ranges)?;

    let mut file = fs::File::create(output)?;
    file.write_all(&data)?;

    println!(
        "Built {:?} -> {:?}: {} ranges, {} bytes",
        input,
        output,
        ranges.len(),
        data.len()
    );
    Ok(())
}

fn update(output: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let updater = Updater::new(output);

    if !force && !updater.needs_update() {
        println!("{:?} is up to date", output);
        return Ok(());
    }

    let size = updater.update()?;
    match updater.installed_version() {
        Some(version) => println!("Installed version {} at {:?} ({} bytes)", version, output, size),
        None => println!("Installed {:?} ({} bytes)", output, size),
    }
    Ok(())
}
