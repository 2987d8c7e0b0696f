//! Commands that modify a store.

use clap::Args;

use super::{open_store, print_success};
use crate::Cli;

/// Insert or replace an entry.
#[derive(Args)]
pub struct PutCommand {
    /// Key
    key: String,
    /// Value
    value: String,
    /// Tag, e.g. a batch or generation marker
    #[arg(short, long, default_value = "")]
    tag: String,
    /// Check that the value is valid JSON and store it compacted
    #[arg(long)]
    json_value: bool,
}

impl PutCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, store) = open_store(cli)?;
        if self.json_value {
            let value: serde_json::Value = serde_json::from_str(&self.value)?;
            store.put_json(&self.key, &self.tag, &value)?;
        } else {
            store.put(&self.key, &self.value, &self.tag)?;
        }
        print_success(&format!("Put {}", self.key));
        Ok(())
    }
}

/// Delete one key, or every entry carrying a tag.
#[derive(Args)]
pub struct DeleteCommand {
    /// Key to delete
    #[arg(required_unless_present = "tag", conflicts_with = "tag")]
    key: Option<String>,
    /// Delete every entry with exactly this tag instead
    #[arg(long)]
    tag: Option<String>,
}

impl DeleteCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, store) = open_store(cli)?;
        let n = match (&self.key, &self.tag) {
            (_, Some(tag)) => store.delete_all_with_tag(tag)?,
            (Some(key), None) => store.delete(key)?,
            (None, None) => anyhow::bail!("a key or --tag is required"),
        };
        print_success(&format!("Deleted {} entries", n));
        Ok(())
    }
}

/// Delete every entry whose tag sorts strictly before a watermark.
///
/// Tags compare as strings: use zero-padded timestamps or versions.
#[derive(Args)]
pub struct ExpireCommand {
    /// Watermark tag
    before: String,
}

impl ExpireCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, store) = open_store(cli)?;
        let n = store.delete_where_tag_less_than(&self.before)?;
        print_success(&format!("Expired {} entries tagged before {:?}", n, self.before));
        Ok(())
    }
}

/// Delete every entry in the store.
#[derive(Args)]
pub struct ClearCommand {
    /// Confirm the deletion
    #[arg(long)]
    yes: bool,
}

impl ClearCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        if !self.yes {
            anyhow::bail!("refusing to clear the store without --yes");
        }
        let (ctx, store) = open_store(cli)?;
        let n = store.delete_all()?;
        print_success(&format!("Cleared {} entries from {}", n, ctx.store.name()));
        Ok(())
    }
}
