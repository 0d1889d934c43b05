use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use refnum::config::{GeneratorConfig, StoreConfig};
use refnum::contracts::{
    Environment, NumberPool, ProductId, ReferenceKind, Scope, SequenceCounterStore, TenantId,
    UseCase,
};
use refnum::generator::ReferenceNumberGenerator;
use refnum::storage::{ReferenceNumberPool, RocksDbSequenceCounter, RocksDbStore};

/// Administrative access to reference-number pools and counters.
#[derive(Debug, Parser)]
#[command(name = "refnum", version, about = "Manage reference-number pools and generated codes")]
struct CliArgs {
    /// RocksDB directory. Defaults to `REFNUM_DATA_DIR` or `./data`.
    #[arg(long, global = true, value_name = "path")]
    data_dir: Option<PathBuf>,

    /// Print metrics for this invocation in Prometheus format when done.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct ScopeArgs {
    #[arg(long)]
    tenant: TenantId,
    #[arg(long)]
    product: ProductId,
    #[arg(long, default_value = "development")]
    environment: Environment,
}

impl ScopeArgs {
    fn scope(&self) -> Scope {
        Scope::new(self.tenant, self.product, self.environment)
    }
}

#[derive(Debug, Clone, Args)]
struct PoolArgs {
    #[command(flatten)]
    scope: ScopeArgs,
    #[arg(long, default_value = "policy")]
    kind: ReferenceKind,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load numbers from a file, one per line.
    Load {
        #[command(flatten)]
        pool: PoolArgs,
        file: PathBuf,
    },
    /// Assign one unassigned number and print it.
    Consume {
        #[command(flatten)]
        pool: PoolArgs,
    },
    /// Delete unassigned numbers; assigned ones are left alone.
    Delete {
        #[command(flatten)]
        pool: PoolArgs,
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// Remove every number of the kind in the scope, assigned or not.
    Purge {
        #[command(flatten)]
        pool: PoolArgs,
    },
    /// List unassigned numbers.
    Available {
        #[command(flatten)]
        pool: PoolArgs,
    },
    /// Draw the next seed from a sequence counter.
    Next {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value = "quote_number")]
        use_case: UseCase,
    },
    /// Generate fresh codes.
    Generate {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Record codes issued elsewhere so generation skips them.
    Import {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(required = true)]
        codes: Vec<String>,
    },
}

fn read_numbers(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn pool(store: &Arc<RocksDbStore>, args: &PoolArgs) -> ReferenceNumberPool {
    ReferenceNumberPool::new(Arc::clone(store), args.kind)
}

fn generator(store: &Arc<RocksDbStore>, args: &ScopeArgs) -> ReferenceNumberGenerator {
    let mut generator = ReferenceNumberGenerator::for_store(store, GeneratorConfig::from_env());
    generator.set_properties(args.tenant, args.product, args.environment);
    generator
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("refnum=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let mut config = StoreConfig::from_env();
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    let store = Arc::new(RocksDbStore::open(config)?);

    match &args.command {
        Command::Load { pool: pool_args, file } => {
            let numbers = read_numbers(file)?;
            let inserted = pool(&store, pool_args).load_for_product(&pool_args.scope.scope(), &numbers)?;
            println!("{inserted}");
        }
        Command::Consume { pool: pool_args } => {
            let number = pool(&store, pool_args).consume_for_product(&pool_args.scope.scope())?;
            println!("{number}");
        }
        Command::Delete {
            pool: pool_args,
            numbers,
        } => {
            let deleted = pool(&store, pool_args).delete_for_product(&pool_args.scope.scope(), numbers)?;
            for number in deleted {
                println!("{number}");
            }
        }
        Command::Purge { pool: pool_args } => {
            let removed = pool(&store, pool_args).purge_for_product(&pool_args.scope.scope())?;
            println!("{removed}");
        }
        Command::Available { pool: pool_args } => {
            let available = pool(&store, pool_args).get_available_for_product(&pool_args.scope.scope())?;
            for number in available {
                println!("{number}");
            }
        }
        Command::Next { scope, use_case } => {
            let counter = RocksDbSequenceCounter::new(Arc::clone(&store));
            println!("{}", counter.next(&scope.scope(), *use_case)?);
        }
        Command::Generate { scope, count } => {
            let generator = generator(&store, scope);
            for _ in 0..*count {
                println!("{}", generator.generate()?);
            }
        }
        Command::Import { scope, codes } => {
            let generator = generator(&store, scope);
            for code in codes {
                generator.import_issued(code)?;
            }
        }
    }

    if args.metrics {
        print!("{}", store.metrics().format_prometheus());
    }

    Ok(())
}
