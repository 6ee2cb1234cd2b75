//! lyric-attention CLI — follow a phrase's attention through a lyric.
//!
//! Loads a BERT-family encoder (downloaded from HuggingFace on first run),
//! finds every line containing the phrase and reports how much attention the
//! phrase receives in its surrounding context.
//!
//! # Output
//!
//! By default a human-readable summary:
//!
//! ```text
//! Found 6 occurrences of 'I walk alone'
//! Occurrence 1:     I walk alone down this empty street  (layer 11 attention 0.183)
//! ```
//!
//! With `--json`, the full analysis (whole-lyric attention plus the phrase
//! report) as JSON on stdout.
//!
//! Exit code 0 on success, non-zero on error.

use std::path::PathBuf;

use clap::Parser;
use lyric_attention::{AttentionExtractor, config::{DEFAULT_MODEL, ExtractorConfig}};

const SAMPLE_LYRICS: &str = "
    I walk alone down this empty street
    The city lights are calling me
    But I walk alone, with heavy feet
    Dreams are fading, can't you see

    I walk alone through the pouring rain
    Each step echoes my silent pain
    But I walk alone, it's all the same
    Nothing left but this refrain

    I walk alone, but now I see
    The path ahead is meant for me
    I walk alone, and I am free
    This is who I'm meant to be
    ";

#[derive(Parser, Debug)]
#[command(
    name = "lyric-attention",
    about = "Track transformer attention to a phrase across song lyrics",
    long_about = "Run a BERT-family encoder over each line that contains a phrase\n\
                  (with two lines of context either side) and report the attention\n\
                  the phrase receives. Downloads model weights from HuggingFace on first run."
)]
struct Args {
    /// HuggingFace model id or local checkpoint directory.
    #[arg(long, short = 'm', default_value = DEFAULT_MODEL)]
    model: String,

    /// Hub revision (branch, tag or commit).
    #[arg(long, default_value = "main")]
    revision: String,

    /// Phrase to follow (case-insensitive).
    #[arg(long, short = 'p', default_value = "I walk alone")]
    phrase: String,

    /// Lyrics file. Uses a built-in sample when omitted.
    #[arg(long, short = 'l')]
    lyrics_file: Option<PathBuf>,

    /// Layer used for the attention summary. Defaults to the last layer.
    #[arg(long)]
    layer: Option<usize>,

    /// Print the full analysis as JSON instead of the summary.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let lyrics = match &args.lyrics_file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?,
        None => SAMPLE_LYRICS.to_string(),
    };

    let config = ExtractorConfig {
        revision: args.revision,
        ..ExtractorConfig::default()
    };
    let extractor = AttentionExtractor::load_with_config(&args.model, config)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", args.model))?;

    let layer = args.layer.unwrap_or(extractor.num_layers() - 1);
    if layer >= extractor.num_layers() {
        anyhow::bail!(
            "layer {layer} out of range, {} has {} layers",
            args.model,
            extractor.num_layers()
        );
    }

    if args.json {
        let analysis = extractor
            .analyze(&lyrics, Some(&args.phrase))
            .map_err(|e| anyhow::anyhow!("analysis failed: {e}"))?;
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    let results = extractor
        .analyze_phrase_evolution(&lyrics, &args.phrase)
        .map_err(|e| anyhow::anyhow!("analysis failed: {e}"))?;

    println!(
        "Found {} occurrences of '{}'",
        results.total_occurrences, results.target_phrase
    );
    for occurrence in &results.occurrences {
        match occurrence.attention_strength(layer) {
            Some(strength) => println!(
                "Occurrence {}: {}  (layer {layer} attention {strength:.3})",
                occurrence.occurrence, occurrence.sentence
            ),
            None => println!(
                "Occurrence {}: {}  (phrase tokens not found in context)",
                occurrence.occurrence, occurrence.sentence
            ),
        }
    }

    Ok(())
}
