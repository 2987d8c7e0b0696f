//! Configuration management commands.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use tagkv::{PostgresConfig, SqliteConfig, StoreConfig, ValueType};
use tagkv_cli::{Context, mask_password};

use super::{get_config, output_result, print_info, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Contexts name the stores the other commands operate on.
///
/// Configuration is stored in ~/.tagkv/tagkv/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Sqlite,
    Postgres,
}

#[derive(Clone, Copy, ValueEnum)]
enum ValueTypeArg {
    Jsonb,
    Text,
}

impl From<ValueTypeArg> for ValueType {
    fn from(v: ValueTypeArg) -> Self {
        match v {
            ValueTypeArg::Jsonb => ValueType::Jsonb,
            ValueTypeArg::Text => ValueType::Text,
        }
    }
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add a new context
    #[command(name = "add-context")]
    AddContext {
        /// Context name
        name: String,
        /// Storage backend
        #[arg(long, value_enum)]
        backend: BackendArg,
        /// Store name (defaults to the context name)
        #[arg(long)]
        store: Option<String>,
        /// SQLite directory (":memory:" for a throwaway store)
        #[arg(long)]
        dir: Option<String>,
        /// SQLite journal mode
        #[arg(long)]
        journal_mode: Option<String>,
        /// PostgreSQL connection string
        #[arg(long)]
        connection: Option<String>,
        /// PostgreSQL value column type
        #[arg(long, value_enum)]
        value_type: Option<ValueTypeArg>,
        /// PostgreSQL pool size
        #[arg(long)]
        max_connections: Option<u32>,
        /// Default scan limit
        #[arg(long)]
        scan_limit: Option<usize>,
    },
    /// Delete a context
    #[command(name = "delete-context")]
    DeleteContext {
        /// Context name
        name: String,
    },
    /// Set the current context
    #[command(name = "use-context")]
    UseContext {
        /// Context name
        name: String,
    },
    /// Display the current context
    #[command(name = "get-context")]
    GetContext,
    /// List all contexts
    #[command(name = "list-contexts", alias = "get-contexts")]
    ListContexts,
    /// View the current configuration
    View,
}

#[derive(Serialize)]
struct ContextView {
    name: String,
    current: bool,
    backend: &'static str,
    store: String,
    location: String,
}

fn view(ctx: &Context, current: &str) -> ContextView {
    let location = match &ctx.store {
        StoreConfig::Sqlite(c) => c
            .path()
            .map_or_else(|| c.dir.clone(), |p| p.display().to_string()),
        StoreConfig::Postgres(c) => mask_password(&c.connection),
    };
    ContextView {
        name: ctx.name.clone(),
        current: ctx.name == current,
        backend: ctx.store.backend(),
        store: ctx.store.name().to_string(),
        location,
    }
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddContext {
                name,
                backend,
                store,
                dir,
                journal_mode,
                connection,
                value_type,
                max_connections,
                scan_limit,
            } => {
                let mut cfg = get_config(cli)?;
                let store_name = store.clone().unwrap_or_else(|| name.clone());

                let store = match backend {
                    BackendArg::Sqlite => {
                        let mut c = SqliteConfig::new(store_name, dir.clone().unwrap_or_default());
                        c.journal_mode = journal_mode.clone();
                        StoreConfig::from(c)
                    }
                    BackendArg::Postgres => {
                        let Some(connection) = connection else {
                            anyhow::bail!("--connection is required for the postgres backend");
                        };
                        let mut c = PostgresConfig::new(store_name, connection.clone());
                        if let Some(v) = value_type {
                            c.value_type = (*v).into();
                        }
                        if let Some(n) = max_connections {
                            c.max_connections = *n;
                        }
                        StoreConfig::from(c)
                    }
                };

                let mut ctx = Context::new(store);
                ctx.scan_limit = scan_limit.unwrap_or(0);
                cfg.add_context(name, ctx)?;
                print_success(&format!("Context '{}' added", name));
                Ok(())
            }
            ConfigSubcommand::DeleteContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_context(name)?;
                print_success(&format!("Context '{}' deleted", name));
                Ok(())
            }
            ConfigSubcommand::UseContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_context(name)?;
                print_success(&format!("Switched to context '{}'", name));
                Ok(())
            }
            ConfigSubcommand::GetContext => {
                let cfg = get_config(cli)?;
                match cfg.get_current_context() {
                    Some(ctx) => output_result(cli, &view(ctx, &cfg.current_context)),
                    None => {
                        print_info("No current context set");
                        Ok(())
                    }
                }
            }
            ConfigSubcommand::ListContexts => {
                let cfg = get_config(cli)?;
                if cfg.contexts.is_empty() {
                    print_info("No contexts configured");
                    return Ok(());
                }
                let views: Vec<ContextView> = cfg
                    .contexts
                    .values()
                    .map(|ctx| view(ctx, &cfg.current_context))
                    .collect();
                output_result(cli, &views)
            }
            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;
                println!("Config file: {}", cfg.path().display());
                let mut shown = cfg.clone();
                for ctx in shown.contexts.values_mut() {
                    if let StoreConfig::Postgres(c) = &mut ctx.store {
                        c.connection = mask_password(&c.connection);
                    }
                }
                output_result(cli, &shown)
            }
        }
    }
}
