use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "creditdesk")]
#[command(about = "Browse credit limit, debtor, application and task lists from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the built-in list screens and their filters
    Screens,

    /// Mount a list screen and print the current page
    List {
        /// Screen key (see `creditdesk screens`)
        screen: String,

        /// Address query string to mount with, e.g. "page=2&entityType=TRUST"
        #[arg(long, default_value = "")]
        params: String,

        /// Page to show
        #[arg(short, long)]
        page: Option<u32>,

        /// Records per page (10, 15, 20, 25, 50 or 100)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Filter to apply as key=value; an empty value clears the field
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Print CSV instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// Show or change the column selection of a screen
    Columns {
        /// Screen key (see `creditdesk screens`)
        screen: String,

        /// Column to hide
        #[arg(long)]
        hide: Vec<String>,

        /// Column to show
        #[arg(long)]
        show: Vec<String>,

        /// Persist the resulting selection
        #[arg(long, conflicts_with = "reset")]
        save: bool,

        /// Restore the default columns
        #[arg(long)]
        reset: bool,
    },
}

impl Commands {
    /// Split a `key=value` filter argument
    pub fn parse_filter(raw: &str) -> Result<(String, String)> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid filter '{}'. Expected KEY=VALUE", raw))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("Invalid filter '{}'. Missing key", raw));
        }
        Ok((key.to_string(), value.trim().to_string()))
    }
}
