//! Utility functions for CLI commands.

use tagkv::DynStore;
use tagkv_cli::{Config, Context, Output, OutputFormat, load_config, print_verbose};

use crate::Cli;

const APP_NAME: &str = "tagkv";

/// Default scan limit when neither the flag nor the context sets one.
pub const DEFAULT_SCAN_LIMIT: usize = 100;

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(APP_NAME, cli.config.as_deref())
}

/// Gets the context configuration to use.
pub fn get_context(cli: &Cli) -> anyhow::Result<Context> {
    let cfg = get_config(cli)?;

    match cfg.resolve_context(cli.context.as_deref()) {
        Some(ctx) => Ok(ctx.clone()),
        None => match cli.context.as_deref() {
            Some(name) => anyhow::bail!("context '{}' not found", name),
            None => anyhow::bail!(
                "no context specified. Use -c flag or set a default context with 'tagkv config use-context'"
            ),
        },
    }
}

/// Opens the store of the selected context.
pub fn open_store(cli: &Cli) -> anyhow::Result<(Context, DynStore)> {
    let ctx = get_context(cli)?;
    print_verbose(
        cli.verbose,
        &format!(
            "opening {} store {:?} (context {})",
            ctx.store.backend(),
            ctx.store.name(),
            ctx.name
        ),
    );
    let store = ctx.open()?;
    Ok((ctx, store))
}

/// Resolves the scan limit from the flag, then the context.
pub fn scan_limit(flag: Option<usize>, ctx: &Context) -> usize {
    match flag {
        Some(n) => n,
        None if ctx.scan_limit > 0 => ctx.scan_limit,
        None => DEFAULT_SCAN_LIMIT,
    }
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(cli: &Cli, result: &T) -> anyhow::Result<()> {
    Output::new(OutputFormat::from_flag(cli.json), cli.output.clone()).write(result)
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}
