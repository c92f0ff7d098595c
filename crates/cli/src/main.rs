use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use ndarray::Array2;

use facegate_core::recognition::identity_store::{IdentityStore, KnownIdentities};

/// Identity store tooling for the face gate service.
#[derive(Parser)]
#[command(name = "facegate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of an identity store.
    Info {
        /// Path to the store file.
        store: PathBuf,
    },
    /// Build a store from a CSV of `name,v1,v2,...` rows.
    Import {
        /// CSV input file.
        csv: PathBuf,
        /// Store file to write.
        store: PathBuf,
    },
    /// Dump a store to CSV (`name,v1,v2,...` per identity).
    Export {
        /// Path to the store file.
        store: PathBuf,
        /// CSV output file.
        csv: PathBuf,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Info { store } => run_info(&store),
        Command::Import { csv, store } => run_import(&csv, &store),
        Command::Export { store, csv } => run_export(&store, &csv),
    }
}

fn run_info(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let identities = IdentityStore::new(store_path).load()?;
    println!(
        "{}: {} identities, dimension {}",
        store_path.display(),
        identities.len(),
        identities.dim()
    );
    for name in identities.names() {
        println!("  {name}");
    }
    Ok(())
}

fn run_import(csv_path: &Path, store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(csv_path)?;
    let identities = parse_csv(&text)?;
    IdentityStore::new(store_path).save(&identities)?;
    log::info!(
        "wrote {} identities to {}",
        identities.len(),
        store_path.display()
    );
    Ok(())
}

fn run_export(store_path: &Path, csv_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let identities = IdentityStore::new(store_path).load()?;
    fs::write(csv_path, format_csv(&identities))?;
    log::info!(
        "exported {} identities to {}",
        identities.len(),
        csv_path.display()
    );
    Ok(())
}

/// One identity per line: a name followed by its embedding values. All rows
/// must agree on the embedding dimension. Names may not contain commas.
fn parse_csv(text: &str) -> Result<KnownIdentities, Box<dyn std::error::Error>> {
    let mut names = Vec::new();
    let mut values = Vec::new();
    let mut dim: Option<usize> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let name = fields
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("line {}: missing name", line_no + 1))?;
        let row: Vec<f32> = fields
            .map(|f| f.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("line {}: {e}", line_no + 1))?;
        if row.is_empty() {
            return Err(format!("line {}: no embedding values", line_no + 1).into());
        }
        match dim {
            None => dim = Some(row.len()),
            Some(d) if d != row.len() => {
                return Err(format!(
                    "line {}: expected {} values, got {}",
                    line_no + 1,
                    d,
                    row.len()
                )
                .into());
            }
            Some(_) => {}
        }
        names.push(name.to_string());
        values.extend(row);
    }

    let dim = dim.ok_or("no identities in input")?;
    let embeddings = Array2::from_shape_vec((names.len(), dim), values)?;
    Ok(KnownIdentities::new(names, embeddings)?)
}

fn format_csv(identities: &KnownIdentities) -> String {
    let mut out = String::new();
    for (name, row) in identities
        .names()
        .iter()
        .zip(identities.embeddings().rows())
    {
        out.push_str(name);
        for value in row {
            out.push(',');
            out.push_str(&value.to_string());
        }
        out.push('\n');
    }
    out
}
