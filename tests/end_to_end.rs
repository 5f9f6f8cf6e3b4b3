use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use transcript_aligner::search::SimplePruner;
use transcript_aligner::{
    AlignerBuilder, AlignerConfig, AlignerSearchManager, AlignmentError, AlignmentInput,
    AlignmentOutput, CharLexicon, FlatLinguist, FrameScores, GrammarBuilder, Lexicon,
    PhraseSpotRegistry, PhraseSpotterResult, ScorerFactory, SimplePhraseSpotter,
};

const VOCAB: &str = "thequickbrownfx";
const DELTA_MS: u64 = 10;

#[derive(Debug, Deserialize)]
struct Fixture {
    frames_per_letter: usize,
    silence_frames: usize,
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
struct Case {
    id: String,
    transcript: String,
    spoken: Vec<String>,
    config: serde_json::Value,
    words: Vec<ExpectedWord>,
}

#[derive(Debug, Deserialize)]
struct ExpectedWord {
    word: String,
    start_ms: u64,
    end_ms: u64,
}

fn load_fixture() -> Fixture {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test-data/synthetic_alignments.json");
    let data = std::fs::read_to_string(&path).expect("read fixture");
    serde_json::from_str(&data).expect("parse fixture")
}

fn lexicon() -> Arc<dyn Lexicon> {
    Arc::new(CharLexicon::new(
        VOCAB.chars().enumerate().map(|(i, c)| (c, i + 1)).collect(),
        0,
    ))
}

/// Log-likelihood 0 for the spoken unit and -10 for every other one. A
/// `<sil>` word is a pause as long as the leading and trailing silence.
fn synthesize(spoken: &[String], frames_per_letter: usize, silence_frames: usize) -> FrameScores {
    let mut units = vec![0; silence_frames];
    for word in spoken {
        if word == "<sil>" {
            units.extend(std::iter::repeat(0).take(silence_frames));
            continue;
        }
        for c in word.chars() {
            let unit = VOCAB.find(c).map(|i| i + 1).expect("letter in vocabulary");
            units.extend(std::iter::repeat(unit).take(frames_per_letter));
        }
    }
    units.extend(std::iter::repeat(0).take(silence_frames));
    FrameScores::new(
        units
            .into_iter()
            .map(|u| {
                let mut row = vec![-10.0; VOCAB.len() + 1];
                row[u] = 0.0;
                row
            })
            .collect(),
    )
}

#[test]
fn synthetic_alignments_match_reference_within_delta() {
    let fixture = load_fixture();
    for case in &fixture.cases {
        let config: AlignerConfig =
            serde_json::from_value(case.config.clone()).expect("case config");
        let aligner = AlignerBuilder::new(config)
            .with_lexicon(lexicon())
            .build()
            .expect("build aligner");
        let input = AlignmentInput {
            transcript: case.transcript.clone(),
            frames: synthesize(&case.spoken, fixture.frames_per_letter, fixture.silence_frames),
        };
        let out = aligner.align(&input).expect("alignment");

        assert_eq!(out.words.len(), case.words.len(), "case {}: {out}", case.id);
        for (got, want) in out.words.iter().zip(&case.words) {
            assert_eq!(got.word, want.word, "case {}", case.id);
            assert!(
                got.start_ms().abs_diff(want.start_ms) <= DELTA_MS
                    && got.end_ms().abs_diff(want.end_ms) <= DELTA_MS,
                "case {}: {} aligned to {}..{} ms, expected {}..{} ms",
                case.id,
                got.word,
                got.start_ms(),
                got.end_ms(),
                want.start_ms,
                want.end_ms
            );
        }
    }
}

#[test]
fn printed_alignment_parses_back() {
    let fixture = load_fixture();
    let case = &fixture.cases[0];
    let aligner = AlignerBuilder::new(AlignerConfig::default())
        .with_lexicon(lexicon())
        .build()
        .expect("build aligner");
    let frames = synthesize(&case.spoken, fixture.frames_per_letter, fixture.silence_frames);
    let out = aligner
        .align_with_scorer(&case.transcript, &frames)
        .expect("alignment");

    let parsed = AlignmentOutput::parse(&out.to_string());
    assert_eq!(parsed.words.len(), out.words.len());
    for (a, b) in parsed.words.iter().zip(&out.words) {
        assert_eq!(a.word, b.word);
        assert!((a.start - b.start).abs() < 1e-9);
    }
}

#[test]
fn search_manager_decodes_in_blocks() {
    let words: Vec<String> = ["the", "quick", "fox"].map(String::from).to_vec();
    let frames = synthesize(&words, 3, 5);
    let grammar = Arc::new(GrammarBuilder::new(Default::default()).build(&words).unwrap());
    let config = AlignerConfig::default();

    let mut manager = AlignerSearchManager::new(
        Box::new(FlatLinguist::new(grammar, lexicon(), config.linguist.clone())),
        Box::new(SimplePruner),
        frames.create_scorer(),
        &config.beam,
        config.search.clone(),
    );
    manager.allocate().unwrap();
    manager.start_recognition().unwrap();

    let mut partials = 0;
    let result = loop {
        let result = manager.recognize(7).unwrap().expect("partial result");
        if result.is_final() {
            break result;
        }
        partials += 1;
        assert_eq!(result.frame_number(), partials * 7);
    };
    manager.stop_recognition();
    manager.deallocate();

    assert_eq!(partials, 6);
    assert_eq!(result.frame_number(), 43);
    assert!(result.has_final_token());
    assert_eq!(result.best_result_no_filler(), "the quick fox");
    assert_eq!(
        result.timed_best_result(false),
        "the(0.05,0.14) quick(0.14,0.29) fox(0.29,0.38)"
    );
}

#[test]
fn spotter_finds_every_occurrence() {
    let spoken: Vec<String> = ["the", "fox", "<sil>", "quick", "<sil>", "the", "fox"]
        .map(String::from)
        .to_vec();
    let frames = synthesize(&spoken, 3, 5);
    let mut config = AlignerConfig::default();
    config.spotting.linguist.hmm_states_per_unit = 1;
    let mut spotter = SimplePhraseSpotter::new(lexicon(), &config);
    spotter.set_phrase("the fox");

    let results = spotter.spot(&frames).expect("spotting");
    assert_eq!(results.len(), 2);
    let expected = [
        PhraseSpotterResult::new("the fox", 0.05, 0.23).unwrap(),
        PhraseSpotterResult::new("the fox", 0.48, 0.66).unwrap(),
    ];
    for (got, want) in results.iter().zip(&expected) {
        assert!(got.matches_interval(want), "{got} vs {want}");
    }

    let mut registry = PhraseSpotRegistry::default();
    registry.set_results(results);
    assert!(registry.contains("THE", 0.06));
    assert!(!registry.contains("fox", 0.05));
}

#[test]
fn invalid_config_is_rejected_before_decoding() {
    let mut config = AlignerConfig::default();
    config.search.frames_per_second = -1.0;
    let err = AlignerBuilder::new(config)
        .with_lexicon(lexicon())
        .build()
        .err()
        .expect("invalid configuration");
    assert!(matches!(err, AlignmentError::Config { .. }));
}
