//! Commands that read a store.

use clap::Args;
use serde::Serialize;
use tagkv::{Backend, Entry, KVResult, Store};

use super::{open_store, output_result, print_info, scan_limit};
use crate::Cli;

/// Read the entry stored under a key.
#[derive(Args)]
pub struct GetCommand {
    /// Key
    key: String,
    /// Print only the raw value
    #[arg(long)]
    raw: bool,
}

impl GetCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, store) = open_store(cli)?;
        match store.get_entry(&self.key)? {
            Some(entry) if self.raw => {
                println!("{}", entry.value);
                Ok(())
            }
            Some(entry) => output_result(cli, &entry),
            None => anyhow::bail!("key {:?} not found", self.key),
        }
    }
}

/// Count entries and report the smallest and largest key.
#[derive(Args)]
pub struct CountCommand;

impl CountCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, store) = open_store(cli)?;
        output_result(cli, &store.count_all()?)
    }
}

/// Scan entries from a key bound.
///
/// Ascending scans visit keys >= FROM; descending scans visit keys <= FROM.
/// The bound is not a prefix filter; use --prefix to stop at the first key
/// outside a prefix.
#[derive(Args)]
pub struct ScanCommand {
    /// Starting key (default: "" ascending, the last possible key descending)
    #[arg(long)]
    from: Option<String>,
    /// Maximum number of entries
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Scan in descending key order
    #[arg(long)]
    desc: bool,
    /// Stop at the first key without this prefix
    #[arg(long)]
    prefix: Option<String>,
}

// Sorts after every key made of valid UTF-8.
const MAX_KEY: &str = "\u{10FFFF}";

/// Collect up to `limit` entries from `from`, stopping at the first key
/// outside `prefix`. The start is clamped into the prefix range so a bound
/// before (ascending) or after (descending) the prefix still reaches it.
fn scan_entries<B: Backend>(
    store: &Store<B>,
    from: Option<&str>,
    prefix: Option<&str>,
    desc: bool,
    limit: usize,
) -> KVResult<Vec<Entry>> {
    let mut entries = Vec::new();
    let visit = |e: &Entry, stop: &mut bool| {
        if prefix.is_some_and(|p| !e.key.starts_with(p)) {
            *stop = true;
            return;
        }
        entries.push(e.clone());
    };

    if desc {
        let upper = prefix.map(|p| format!("{}{}", p, MAX_KEY));
        let start = match (from, upper.as_deref()) {
            (Some(f), Some(u)) => f.min(u),
            (Some(f), None) => f,
            (None, Some(u)) => u,
            (None, None) => MAX_KEY,
        };
        store.iterate_descending_from(start, limit, visit)?;
    } else {
        let start = match (from, prefix) {
            (Some(f), Some(p)) => f.max(p),
            (f, p) => f.or(p).unwrap_or(""),
        };
        store.iterate_ascending_from(start, limit, visit)?;
    }
    Ok(entries)
}

impl ScanCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (ctx, store) = open_store(cli)?;
        let entries = scan_entries(
            &store,
            self.from.as_deref(),
            self.prefix.as_deref(),
            self.desc,
            scan_limit(self.limit, &ctx),
        )?;
        output_result(cli, &entries)
    }
}

/// Show the entries with the greatest keys, newest first.
#[derive(Args)]
pub struct LatestCommand {
    /// Maximum number of entries
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

impl LatestCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (ctx, store) = open_store(cli)?;
        let mut entries = Vec::new();
        store.iterate_latest(scan_limit(self.limit, &ctx), |e, _| entries.push(e.clone()))?;
        output_result(cli, &entries)
    }
}

/// Dump every entry whose value is valid JSON, in key order.
///
/// Entries holding non-JSON values are skipped.
#[derive(Args)]
pub struct DumpCommand;

#[derive(Serialize)]
struct Dumped {
    key: String,
    tag: String,
    value: serde_json::Value,
}

impl DumpCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, store) = open_store(cli)?;
        let mut dumped = Vec::new();
        store.iterate_all::<serde_json::Value, _>(|e, value, _| {
            dumped.push(Dumped {
                key: e.key.clone(),
                tag: e.tag.clone(),
                value,
            });
        })?;
        if dumped.is_empty() {
            print_info("No JSON entries");
            return Ok(());
        }
        output_result(cli, &dumped)
    }
}
