use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gramdex::Model;

/// Read grams from stdin, one per line, and print their counts.
#[derive(Parser, Debug)]
struct Args {
    model: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let model = Model::open(&args.model)?;
    tracing::info!(model = %model.kind(), order = model.order(), "model loaded");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let gram = line.trim();
        if gram.is_empty() {
            continue;
        }
        match model.lookup(gram)? {
            Some(count) => println!("{count}"),
            None => println!("NOT FOUND"),
        }
    }
    Ok(())
}
