//! Pointsboard CLI - Serve and inspect sales incentive data
//!
//! # Main Commands
//!
//! ```bash
//! pointsboard serve                 # Start HTTP server (port 3000)
//! pointsboard template              # Print the upload template CSV
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! pointsboard parse data.csv        # Parse an upload file to JSON
//! pointsboard summary data.csv      # Parse and print the regional rollup
//! ```

use clap::{Parser, Subcommand};
use pointsboard::{parse_upload, region_summaries, template_csv, DEFAULT_STATE_DIR};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pointsboard")]
#[command(about = "Sales incentive points dashboard backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Directory where dataset state is persisted
        #[arg(long, default_value = DEFAULT_STATE_DIR)]
        state_dir: PathBuf,
    },

    /// Parse an upload file (CSV/XLSX) and output the records as JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse an upload file and print its regional rollup
    Summary {
        /// Input file
        input: PathBuf,
    },

    /// Print the upload template CSV
    Template {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, state_dir } => cmd_serve(port, state_dir).await,
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
        Commands::Summary { input } => cmd_summary(&input),
        Commands::Template { output } => cmd_template(output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: u16, state_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    pointsboard::server::start_server(port, state_dir).await
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing upload: {}", input.display());

    let records = parse_file(input)?;
    eprintln!("✅ Parsed {} records", records.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_summary(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let records = parse_file(input)?;
    eprintln!("📄 {} records from {}", records.len(), input.display());

    for summary in region_summaries(&records) {
        println!("  📊 {} region", summary.region);
        println!("     Stores:      {}", summary.store_count);
        println!("     Target:      {}", summary.total_target);
        println!("     Achievement: {} ({}%)", summary.total_achievement, summary.achievement_rate);
        println!("     Qualified:   {}", summary.total_qualified);
        println!("     Points:      {}", summary.total_points);
    }

    Ok(())
}

fn cmd_template(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    write_output(&template_csv(), output)
}

fn parse_file(input: &Path) -> Result<Vec<pointsboard::StoreRecord>, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    Ok(parse_upload(file_name, &bytes)?)
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
