use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use transcript_aligner::linguist::UnitId;
use transcript_aligner::{
    AlignerBuilder, AlignerConfig, AlignmentInput, AlignmentOutput, CharLexicon, FrameScores,
};

/// `{ "transcript", "vocab", "silence_unit", "frames" }`, where `frames[t][unit]`
/// holds log-likelihoods.
#[derive(Debug, Deserialize)]
struct ScoreFile {
    transcript: String,
    vocab: HashMap<String, UnitId>,
    #[serde(default)]
    silence_unit: UnitId,
    frames: FrameScores,
}

#[derive(Debug, Parser)]
#[command(name = "align_scores")]
#[command(about = "Align a transcript against a table of per-frame unit scores")]
struct Args {
    /// Score file to align.
    #[arg(long, env = "ALIGN_SCORES_INPUT")]
    input: PathBuf,
    /// Aligner configuration JSON; missing fields keep their defaults.
    #[arg(long, env = "ALIGN_SCORES_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "ALIGN_SCORES_MODEL_DELETIONS", default_value_t = false)]
    model_deletions: bool,
    #[arg(long, env = "ALIGN_SCORES_MODEL_REPETITIONS", default_value_t = false)]
    model_repetitions: bool,
    #[arg(long, env = "ALIGN_SCORES_MODEL_BACKWARD_JUMPS", default_value_t = false)]
    model_backward_jumps: bool,
    #[arg(long, env = "ALIGN_SCORES_JUMPS")]
    num_jumps: Option<usize>,
    #[arg(long, env = "ALIGN_SCORES_FORWARD_JUMP_PROB")]
    forward_jump_probability: Option<f64>,
    #[arg(long, env = "ALIGN_SCORES_BACKWARD_JUMP_PROB")]
    backward_jump_probability: Option<f64>,
    #[arg(long, env = "ALIGN_SCORES_SELF_LOOP_PROB")]
    self_loop_probability: Option<f64>,
    /// Spot short phrases first and reward matching word entries.
    #[arg(long, env = "ALIGN_SCORES_SPOTTING", default_value_t = false)]
    spotting: bool,
    #[arg(long, env = "ALIGN_SCORES_FRAMES_PER_SECOND")]
    frames_per_second: Option<f32>,
    /// Print JSON instead of the `word(start,end)` line.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = run() {
        tracing::error!("{message}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => AlignerConfig::load(path).map_err(|e| e.to_string())?,
        None => AlignerConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let data = fs::read_to_string(&args.input)
        .map_err(|e| format!("failed to read {}: {e}", args.input.display()))?;
    let file: ScoreFile = serde_json::from_str(&data)
        .map_err(|e| format!("failed to parse {}: {e}", args.input.display()))?;
    tracing::info!(
        frames = file.frames.len(),
        units = file.vocab.len(),
        "align_scores: input loaded"
    );

    let lexicon = CharLexicon::from_entries(file.vocab, file.silence_unit);
    let aligner = AlignerBuilder::new(config)
        .with_lexicon(Arc::new(lexicon))
        .build()
        .map_err(|e| e.to_string())?;

    let input = AlignmentInput {
        transcript: file.transcript,
        frames: file.frames,
    };
    let output = aligner.align(&input).map_err(|e| e.to_string())?;
    print_output(&output, args.json)
}

fn apply_overrides(config: &mut AlignerConfig, args: &Args) {
    let grammar = &mut config.grammar;
    grammar.model_deletions |= args.model_deletions;
    grammar.model_repetitions |= args.model_repetitions;
    grammar.model_backward_jumps |= args.model_backward_jumps;
    if let Some(n) = args.num_jumps {
        grammar.num_allowed_grammar_jumps = n;
    }
    if let Some(p) = args.forward_jump_probability {
        grammar.forward_jump_probability = p;
    }
    if let Some(p) = args.backward_jump_probability {
        grammar.backward_transition_probability = p;
    }
    if let Some(p) = args.self_loop_probability {
        grammar.self_loop_probability = p;
    }
    config.spotting.enabled |= args.spotting;
    if let Some(fps) = args.frames_per_second {
        config.search.frames_per_second = fps;
    }
}

fn print_output(output: &AlignmentOutput, json: bool) -> Result<(), String> {
    if json {
        let text = serde_json::to_string_pretty(output).map_err(|e| e.to_string())?;
        println!("{text}");
    } else {
        println!("{output}");
    }
    Ok(())
}
