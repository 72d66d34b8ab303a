use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod cli;

use cli::{Cli, Commands};
use creditdesk::config::Config;
use creditdesk::list_state::url_sync::parse_filter_value;
use creditdesk::list_state::{ListScreen, ScreenServices};
use creditdesk::models::FilterValue;
use creditdesk::output;
use creditdesk::screens::{self, ScreenDefinition};
use creditdesk::services::{ApiClient, MemoryAddress, ScreenApi, TracingNotifier};
use creditdesk::storage::SqliteFilterCache;

#[tokio::main]
async fn main() -> Result<()> {
    // Set default log level to INFO if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "creditdesk=info");
    }

    // Initialize logging to both console and file
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let file_appender = tracing_appender::rolling::never(".", "creditdesk.log");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Screens => {
            print_screens();
            Ok(())
        }

        Commands::List {
            screen,
            params,
            page,
            limit,
            filters,
            csv,
        } => run_list(screen, params, *page, *limit, filters, *csv).await,

        Commands::Columns {
            screen,
            hide,
            show,
            save,
            reset,
        } => run_columns(screen, hide, show, *save, *reset).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn print_screens() {
    for screen in screens::builtin() {
        println!("{} - {}", screen.key, screen.title);
        for field in &screen.filters {
            println!("    {:<16} {:<24} {:?}", field.name, field.label, field.kind);
        }
    }
}

/// Build a screen against the configured API, mounted at `query`
async fn open_screen(key: &str, query: &str) -> Result<(ListScreen, Arc<MemoryAddress>)> {
    let config = Config::from_env()?;
    config.validate()?;

    let definition = screens::find(key).ok_or_else(|| {
        let known: Vec<String> = screens::builtin().into_iter().map(|s| s.key).collect();
        anyhow!("Unknown screen '{}'. Known screens: {}", key, known.join(", "))
    })?;

    let client = Arc::new(ApiClient::new(&config)?);
    let api = Arc::new(ScreenApi::new(client, definition.clone()));
    let address = Arc::new(MemoryAddress::with_query(&format!("/{}", key), query)?);
    let cache = Arc::new(
        SqliteFilterCache::new(config.database_path_str())
            .await
            .context("Failed to open filter cache")?,
    );

    let services = ScreenServices::with_backend(api, Arc::new(TracingNotifier), address.clone(), cache);
    let screen = ListScreen::new(definition, config.limit_policy(), services);
    screen.mount().await?;
    Ok((screen, address))
}

async fn run_list(
    key: &str,
    query: &str,
    page: Option<u32>,
    limit: Option<u32>,
    filters: &[String],
    csv: bool,
) -> Result<()> {
    let (screen, address) = open_screen(key, query).await?;

    if !filters.is_empty() {
        for raw in filters {
            let (name, value) = Commands::parse_filter(raw)?;
            let value = parse_cli_filter(screen.definition(), &name, &value)?;
            screen.update_filter(&name, value)?;
        }
        screen.apply_filters_if_changed().await?;
    }
    if let Some(limit) = limit {
        screen.change_limit(limit).await?;
    }
    if let Some(page) = page {
        screen.go_to_page(page).await?;
    }

    let snapshot = screen.snapshot();
    let columns = output::columns_for(&snapshot);
    if csv {
        output::write_csv(std::io::stdout().lock(), &columns, &snapshot.docs)?;
    } else {
        print!("{}", output::render_table(&columns, &snapshot.docs));
        println!("{}", output::page_summary(&snapshot));
    }

    info!("Address: {}", address.current());
    screen.unmount();
    Ok(())
}

fn parse_cli_filter(
    definition: &ScreenDefinition,
    name: &str,
    raw: &str,
) -> Result<Option<FilterValue>> {
    let field = definition
        .field(name)
        .ok_or_else(|| anyhow!("Screen '{}' has no filter '{}'", definition.key, name))?;
    if raw.is_empty() {
        return Ok(None);
    }
    parse_filter_value(field, raw)
        .map(Some)
        .ok_or_else(|| anyhow!("Invalid value '{}' for filter '{}'", raw, name))
}

async fn run_columns(key: &str, hide: &[String], show: &[String], save: bool, reset: bool) -> Result<()> {
    let (screen, _address) = open_screen(key, "").await?;

    for name in hide {
        screen.set_column_visible(name, false)?;
    }
    for name in show {
        screen.set_column_visible(name, true)?;
    }

    if reset {
        screen.reset_columns().await?;
    } else if save {
        screen.save_columns().await?;
    }

    let columns = screen.snapshot().columns;
    for (position, column) in columns.custom_fields().iter().enumerate() {
        let mark = if column.visible { "x" } else { " " };
        println!("{:>3} [{}] {:<24} {}", position + 1, mark, column.name, column.label);
    }
    if columns.is_modified() {
        println!("(unsaved changes; pass --save to keep them)");
    } else if columns.is_default() {
        println!("(using default columns)");
    }

    screen.unmount();
    Ok(())
}
