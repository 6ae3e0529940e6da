use anyhow::{anyhow, Result};
use clap::Parser;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parcel_audit::audit::{find_tampered_events, verify_chain, PersistedBatch};

#[derive(Parser)]
#[command(name = "verify-audit-chain")]
#[command(about = "Replay exported audit batches and verify the hash chain")]
struct Cli {
    /// Exported batches: a JSON array or one batch per line
    #[arg(short, long)]
    batches: PathBuf,

    /// Chain head the replay must end at
    #[arg(short, long)]
    expected_head: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "parcel_audit=error"
    } else if cli.verbose {
        "parcel_audit=debug"
    } else {
        "parcel_audit=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(&cli) {
        error!("Audit chain verification failed: {}", e);
        std::process::exit(1);
    }

    if !cli.quiet {
        println!("✓ Audit chain verification completed successfully");
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!("Verifying audit batches: {}", cli.batches.display());
    let batches = load_batches(&cli.batches)?;
    if batches.is_empty() {
        return Err(anyhow!("No batches found in {}", cli.batches.display()));
    }

    let result = verify_chain(&batches);
    if !result.is_valid {
        for batch in &batches {
            for index in find_tampered_events(&batch.events) {
                println!("  tampered: batch {} event {}", batch.batch_id, index);
            }
        }
        return Err(anyhow!(result.summary()));
    }

    if let Some(expected) = &cli.expected_head {
        if result.final_head.as_deref() != Some(expected.as_str()) {
            return Err(anyhow!(
                "Chain head mismatch. Expected: {}, Got: {}",
                expected,
                result.final_head.as_deref().unwrap_or("none")
            ));
        }
    }

    if cli.verbose {
        print_summary(&batches);
    }
    if !cli.quiet {
        println!("{}", result.summary());
    }
    Ok(())
}

fn load_batches(path: &Path) -> Result<Vec<PersistedBatch>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse batch array: {}", e));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| anyhow!("Failed to parse batch at line {}: {}", n + 1, e))
        })
        .collect()
}

fn print_summary(batches: &[PersistedBatch]) {
    let mut event_types: HashMap<&str, usize> = HashMap::new();
    for event in batches.iter().flat_map(|b| &b.events) {
        *event_types.entry(event.event_type.as_str()).or_insert(0) += 1;
    }

    println!("\nAudit Chain Summary:");
    println!("  Batches: {}", batches.len());
    for batch in batches {
        println!("  {}", batch.summary());
    }
    println!("\nEvent type distribution:");
    for (event_type, count) in event_types {
        println!("  {}: {}", event_type, count);
    }
}
