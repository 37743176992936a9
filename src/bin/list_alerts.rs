//! list_alerts - print persisted alert records

use anyhow::Result;
use clap::Parser;

use zone_sentinel::alert::{AlertStore, SqliteAlertStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the alerts database.
    #[arg(long, default_value = "alerts.db")]
    db: String,
    /// Emit records as a JSON array instead of text lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let store = SqliteAlertStore::open(&args.db)?;
    let records = store.list_all()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("no alerts recorded");
        return Ok(());
    }
    for record in &records {
        println!(
            "#{} {} at {} screenshot={}",
            record.id,
            record.item_name,
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            if record.screenshot_path.is_empty() {
                "(none)"
            } else {
                record.screenshot_path.as_str()
            }
        );
    }
    Ok(())
}
