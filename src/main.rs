//! heapfile - inspect and edit a heap file from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use heapfile::access::{Rid, Tuple};
use heapfile::database::{Database, DEFAULT_POOL_SIZE};
use heapfile::storage::{PageId, TablePage};
use std::path::PathBuf;

/// Inspect and edit a heap file of slotted pages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database file
    #[arg(short = 'f', long, default_value = "./heapfile.db")]
    data_file: PathBuf,

    /// Number of buffer pool frames
    #[arg(short = 'p', long, default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert each value as one tuple
    Insert {
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Print the tuple at a rid
    Get { page: u32, slot: u32 },
    /// Replace the tuple at a rid, moving it if it no longer fits its page
    Update { page: u32, slot: u32, value: String },
    /// Delete the tuple at a rid
    Delete { page: u32, slot: u32 },
    /// Print every tuple in scan order
    Scan,
    /// Print the page chain with per-page space usage
    Stats,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if args.pool_size < 2 {
        bail!("--pool-size must be at least 2 (an insert may pin two pages)");
    }

    let db = Database::open_or_create(&args.data_file, args.pool_size)
        .with_context(|| format!("Failed to open {}", args.data_file.display()))?;
    let heap = db.heap();

    match args.command {
        Command::Insert { values } => {
            for value in values {
                let rid = heap.insert_tuple(&Tuple::new(value.into_bytes()))?;
                println!("inserted {}", rid);
            }
        }
        Command::Get { page, slot } => {
            let rid = Rid::new(PageId(page), slot);
            match heap.get_tuple(rid)? {
                Some(tuple) => println!("{} {}", rid, String::from_utf8_lossy(tuple.data())),
                None => bail!("no tuple at {}", rid),
            }
        }
        Command::Update { page, slot, value } => {
            let rid = Rid::new(PageId(page), slot);
            let tuple = Tuple::new(value.into_bytes());
            match heap.update_or_move(&tuple, rid)? {
                Some(new_rid) if new_rid == rid => println!("updated {}", rid),
                Some(new_rid) => println!("moved {} -> {}", rid, new_rid),
                None => bail!("no tuple at {}", rid),
            }
        }
        Command::Delete { page, slot } => {
            let rid = Rid::new(PageId(page), slot);
            if !heap.delete_tuple(rid)? {
                bail!("no tuple at {}", rid);
            }
            println!("deleted {}", rid);
        }
        Command::Scan => {
            let mut count = 0;
            for tuple in heap.iter()? {
                let tuple = tuple?;
                println!("{} {}", tuple.rid(), String::from_utf8_lossy(tuple.data()));
                count += 1;
            }
            println!("{} tuple(s)", count);
        }
        Command::Stats => {
            println!("{:>6} {:>6} {:>6} {:>6} {:>10}", "page", "prev", "next", "live", "free");
            for page_id in heap.page_ids()? {
                let guard = heap.buffer_pool().fetch_page(page_id)?;
                let page = TablePage::from_data(&*guard);
                println!(
                    "{:>6} {:>6} {:>6} {:>6} {:>10}",
                    page_id.to_string(),
                    PageId::from_option(page.prev_page_id()).to_string(),
                    PageId::from_option(page.next_page_id()).to_string(),
                    format!("{}/{}", page.live_tuple_count(), page.tuple_count()),
                    page.free_space()
                );
            }
        }
    }

    db.flush()
}
