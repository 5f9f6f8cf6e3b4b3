/// Splits a raw transcript into grammar words.
///
/// Tokens starting with `SIL_` (any case) are silence annotations and are
/// dropped. The rest are lowercased and reduced to their letters and digits;
/// tokens left empty disappear.
pub fn normalize_transcript(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|token| !is_silence_marker(token))
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn is_silence_marker(token: &str) -> bool {
    token
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sil_"))
}
