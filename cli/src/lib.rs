//! CLI utilities for tagkv.
//!
//! Store contexts live in `~/.tagkv/{app_name}/config.yaml`.

pub mod config;
pub mod output;

pub use config::{Config, Context, load_config, mask_password};
pub use output::{Output, OutputFormat, print_verbose};
