use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gramdex::Model;

/// Score a text file, one sentence per line, with a probability model.
#[derive(Parser, Debug)]
struct Args {
    model: PathBuf,
    /// Text to score; stdin when omitted.
    #[clap(long)]
    text: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let model = Model::open(&args.model)?;
    tracing::info!(model = %model.kind(), order = model.order(), "model loaded");

    let reader: Box<dyn BufRead> = match &args.text {
        Some(path) => Box::new(std::io::BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    let mut total = 0.0f64;
    let mut words = 0u64;
    let mut oovs = 0u64;
    let mut sentences = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (log10_prob, line_oovs) = model.score_sentence(&line)?;
        total += f64::from(log10_prob);
        words += line.split_ascii_whitespace().count() as u64;
        oovs += line_oovs;
        sentences += 1;
    }

    println!("sentences: {sentences}");
    println!("words: {words}");
    println!("OOVs: {oovs}");
    println!("total log10 prob: {total}");
    Ok(())
}
