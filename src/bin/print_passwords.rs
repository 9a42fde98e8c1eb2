//! Print every chapter password for workshop organisers
//!
//! Reads the same catalogue and override settings as the gate, so the sheet
//! always matches what the gate will accept.
//!
//! Usage:
//!   print-passwords
//!   print-passwords --catalogue-path chapters.json --json
//!
//! Environment variables:
//!   CATALOGUE_PATH - JSON chapter catalogue (default: built-in workshop)
//!   WORKSHOP_PASSWORDS - comma-separated passwords by position
//!   WORKSHOP_PW_<INDEX>, WORKSHOP_PW_<ID> - per-chapter overrides

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use chapter_gate::auth::{PasswordDeriver, PasswordOverrides};
use chapter_gate::catalogue::ChapterRegistry;
use chapter_gate::config::env_pairs;

#[derive(Parser, Debug)]
#[command(name = "print-passwords")]
#[command(about = "Print the password for every workshop chapter")]
#[command(version)]
struct Args {
    /// JSON chapter catalogue
    #[arg(long, env = "CATALOGUE_PATH")]
    catalogue_path: Option<PathBuf>,

    /// Comma-separated chapter passwords, indexed by position
    #[arg(long, env = "WORKSHOP_PASSWORDS", value_delimiter = ',')]
    workshop_passwords: Vec<String>,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let registry = Arc::new(match &args.catalogue_path {
        Some(path) => ChapterRegistry::from_json_file(path)?,
        None => ChapterRegistry::workshop()?,
    });
    let overrides = PasswordOverrides::from_env_vars(env_pairs(), &registry)
        .with_bulk(args.workshop_passwords.iter().cloned());
    let roster = PasswordDeriver::new(Arc::clone(&registry), overrides).roster();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&roster)?);
        return Ok(());
    }

    let title_width = roster.iter().map(|e| e.title.len()).max().unwrap_or(5).max(5);
    println!("{:>3}  {:<title_width$}  {:<8}  {:<20}  ID", "#", "TITLE", "PASSWORD", "SOURCE");
    for entry in &roster {
        println!(
            "{:>3}  {:<title_width$}  {:<8}  {:<20}  {}",
            entry.position,
            entry.title,
            entry.password,
            entry.source.to_string(),
            entry.id
        );
    }

    Ok(())
}
