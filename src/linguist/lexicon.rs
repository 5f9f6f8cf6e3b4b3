use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::error::AlignmentError;
use crate::grammar::{SILENCE_SPELLING, UNKNOWN_SPELLING};
use crate::linguist::UnitId;

/// Pronunciation dictionary over a context-independent unit inventory.
pub trait Lexicon: Send + Sync {
    /// Unit sequence for `word`, or `None` when the word cannot be pronounced.
    fn pronunciation(&self, word: &str) -> Option<Vec<UnitId>>;

    fn silence_unit(&self) -> UnitId;

    /// Every context-independent unit, silence included.
    fn units(&self) -> Vec<UnitId>;

    fn is_filler(&self, word: &str) -> bool {
        word == SILENCE_SPELLING || word == UNKNOWN_SPELLING || word.starts_with("++")
    }
}

/// Spells words one character per unit, using a CTC-style character vocabulary.
#[derive(Debug, Clone)]
pub struct CharLexicon {
    vocab: HashMap<char, UnitId>,
    silence_unit: UnitId,
    uppercase: bool,
}

impl CharLexicon {
    pub fn new(vocab: HashMap<char, UnitId>, silence_unit: UnitId) -> Self {
        let mut has_upper = false;
        let mut has_lower = false;
        for c in vocab.keys().copied().filter(|c| c.is_alphabetic()) {
            if c.is_uppercase() {
                has_upper = true;
            }
            if c.is_lowercase() {
                has_lower = true;
            }
        }
        Self {
            vocab,
            silence_unit,
            uppercase: has_upper && !has_lower,
        }
    }

    /// Loads a `{"a": 1, "b": 2, ...}` vocabulary. Multi-character keys
    /// (`<pad>`, `</s>`, ...) are not spellable and are dropped.
    pub fn from_json(path: &Path, silence_unit: UnitId) -> Result<Self, AlignmentError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AlignmentError::io("read lexicon vocabulary", e))?;
        let raw: HashMap<String, UnitId> = serde_json::from_str(&data)
            .map_err(|e| AlignmentError::json("parse lexicon vocabulary", e))?;
        Ok(Self::from_entries(raw, silence_unit))
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, UnitId)>,
        silence_unit: UnitId,
    ) -> Self {
        let vocab = entries
            .into_iter()
            .filter_map(|(k, v)| {
                let mut it = k.chars();
                let c = it.next()?;
                if it.next().is_some() {
                    return None;
                }
                Some((c, v))
            })
            .collect();
        Self::new(vocab, silence_unit)
    }

    pub fn vocab(&self) -> &HashMap<char, UnitId> {
        &self.vocab
    }
}

impl Lexicon for CharLexicon {
    fn pronunciation(&self, word: &str) -> Option<Vec<UnitId>> {
        if word == SILENCE_SPELLING {
            return Some(vec![self.silence_unit]);
        }
        let cased = if self.uppercase {
            word.to_uppercase()
        } else {
            word.to_lowercase()
        };
        let units: Vec<UnitId> = cased
            .chars()
            .filter_map(|c| self.vocab.get(&c).copied())
            .collect();
        (!units.is_empty()).then_some(units)
    }

    fn silence_unit(&self) -> UnitId {
        self.silence_unit
    }

    fn units(&self) -> Vec<UnitId> {
        let mut set: BTreeSet<UnitId> = self.vocab.values().copied().collect();
        set.insert(self.silence_unit);
        set.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower() -> CharLexicon {
        CharLexicon::new([('a', 1), ('b', 2), ('c', 3)].into_iter().collect(), 0)
    }

    #[test]
    fn spells_known_characters() {
        assert_eq!(lower().pronunciation("CAB"), Some(vec![3, 1, 2]));
    }

    #[test]
    fn unknown_characters_are_skipped() {
        assert_eq!(lower().pronunciation("axb"), Some(vec![1, 2]));
        assert_eq!(lower().pronunciation("xyz"), None);
    }

    #[test]
    fn uppercase_only_vocab_uppercases_words() {
        let lex = CharLexicon::new([('A', 1), ('B', 2)].into_iter().collect(), 0);
        assert_eq!(lex.pronunciation("ab"), Some(vec![1, 2]));
    }

    #[test]
    fn silence_uses_silence_unit() {
        assert_eq!(lower().pronunciation(SILENCE_SPELLING), Some(vec![0]));
        assert!(lower().is_filler(SILENCE_SPELLING));
        assert!(!lower().is_filler("cab"));
    }

    #[test]
    fn inventory_includes_silence_once() {
        assert_eq!(lower().units(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn multi_char_keys_are_dropped() {
        let lex = CharLexicon::from_entries(
            [
                ("<pad>".to_string(), 0),
                ("a".to_string(), 1),
                ("|".to_string(), 4),
            ],
            0,
        );
        assert_eq!(lex.vocab().len(), 2);
    }

    #[test]
    fn from_json_reads_vocab_file() {
        let path = std::env::temp_dir().join("transcript_aligner_lexicon_vocab.json");
        std::fs::write(&path, r#"{"<pad>": 0, "d": 1, "o": 2, "g": 3}"#).expect("write vocab");
        let lex = CharLexicon::from_json(&path, 0).expect("load vocab");
        assert_eq!(lex.pronunciation("dog"), Some(vec![1, 2, 3]));
        let _ = std::fs::remove_file(&path);
    }
}
