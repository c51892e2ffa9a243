//! Word-level text helpers shared by keyword and phrase matching.

/// Lowercased alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_lowercase)
    .collect()
}

/// Whether `needle` occurs as a contiguous run in `haystack`.
pub fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
  !needle.is_empty()
    && haystack.windows(needle.len()).any(|window| window == needle)
}

/// The first entry of `phrases` that occurs in `text` as a whole word or
/// contiguous phrase, ignoring case and punctuation.
pub fn find_phrase<'a>(text: &str, phrases: &'a [String]) -> Option<&'a str> {
  let haystack = words(text);
  phrases
    .iter()
    .find(|phrase| contains_phrase(&haystack, &words(phrase)))
    .map(String::as_str)
}
