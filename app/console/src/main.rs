//! FILENAME: app/console/src/main.rs
// PURPOSE: Headless console: runs one spreadsheet query and prints the pivot.
// Usage: console [config.json] [history-token]

use std::path::PathBuf;

use console_lib::{
    init_log_file, install_log_bridge, log_error, log_info, ConsoleConfig, ConsoleResult,
    JsonRpcProxy, LogNotifier, RefreshOutcome, SpreadsheetView,
};
use spreadsheet_engine::{MemorySurface, Table};

const WINDOW_WIDTH_PX: i32 = 1280;
const WINDOW_HEIGHT_PX: i32 = 1024;

async fn run(config: ConsoleConfig, token: Option<String>) -> ConsoleResult<()> {
    let tko = JsonRpcProxy::tko(&config)?;
    let afe = JsonRpcProxy::afe(&config)?;
    let surface = MemorySurface::new(WINDOW_WIDTH_PX, WINDOW_HEIGHT_PX);
    let mut view = SpreadsheetView::new(tko, afe, surface, LogNotifier, config)?;

    if let Some(token) = token {
        view.restore_history_token(&token)?;
    }
    if let RefreshOutcome::Rendered(summary) = view.do_query().await? {
        log_info!("MAIN", "{} tests", summary.total_tests);
        for row in view.spreadsheet().surface().rows(Table::Data) {
            let cells: Vec<&str> = row.iter().map(|c| c.contents.as_str()).collect();
            println!("{}", cells.join("\t"));
        }
    }
    if let Some(completion) = view.job_completion() {
        println!("{}", completion);
    }
    if let Some(url) = view.csv_export_url() {
        log_info!("MAIN", "CSV: {}", url);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => ConsoleConfig::load(&PathBuf::from(path)),
        None => ConsoleConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if let Some(path) = &config.log_file {
        if let Err(e) = init_log_file(path) {
            eprintln!("{}", e);
        }
    }
    if let Err(e) = install_log_bridge(log::LevelFilter::Info) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(config, args.next()).await {
        log_error!("MAIN", "{}", e);
        std::process::exit(1);
    }
}
