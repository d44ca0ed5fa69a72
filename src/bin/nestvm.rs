use anyhow::{Context, Result};
use clap::Parser;
use nestvm::config::{DatastoreConfig, ServiceConfig};
use nestvm::runtime::{DEFAULT_MODULE, Runtime};
use nestvm::sink::Sink;
use nestvm::storage::SqlTable;
use nestvm::web::HttpService;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nestvm", version, about)]
struct Cli {
    /// Source files, evaluated in order against one root context.
    files: Vec<PathBuf>,

    /// Name of the root context and of the record table.
    #[arg(long, default_value = DEFAULT_MODULE)]
    module: String,

    /// Write log output to this file instead of stderr.
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    datastore: DatastoreConfig,

    #[command(flatten)]
    service: ServiceConfig,
}

fn init_logging(log: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run_files(rt: &mut Runtime, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let outcomes = rt
            .run(&source)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        log::info!(
            "{}: {} statements, {} failed",
            path.display(),
            outcomes.len(),
            failed
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;
    log::info!("{:?}", std::env::args().collect::<Vec<_>>());

    let table_path = cli.datastore.table_path();
    let table = SqlTable::open(&table_path, &cli.module)?;
    log::info!(
        "datastore {} table {} at {}",
        cli.datastore.describe(),
        table.name(),
        table_path.display()
    );
    let sink = Sink::spawn(table);

    let mut rt = Runtime::with_sink(&cli.module, sink.handle());
    rt.set_service_config(cli.service.clone());
    rt.set_service(Box::new(HttpService::new(cli.service.static_dir.clone())));
    log::info!("{}", rt.dump());

    let status = run_files(&mut rt, &cli.files);

    rt.shutdown();
    sink.shutdown()?;
    status
}
