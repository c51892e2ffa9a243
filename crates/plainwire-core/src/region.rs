//! Keyword fallback for a story's region tag.
//!
//! Consulted only when the extraction oracle leaves `location_tag` empty.

use std::collections::BTreeMap;

use crate::text::{contains_phrase, words};

/// Find the region tag for `text` in `table` (keyword → tag).
///
/// Keywords match case-insensitively on whole words; multi-word keywords
/// match as a contiguous phrase. When several keywords match, the one with
/// the most words wins, then the longest, then the alphabetically first, so
/// the result depends only on the inputs.
pub fn derive_location_tag(
  text: &str,
  table: &BTreeMap<String, String>,
) -> Option<String> {
  let haystack = words(text);
  table
    .iter()
    .filter_map(|(keyword, tag)| {
      let needle = words(keyword);
      contains_phrase(&haystack, &needle).then_some((needle.len(), keyword, tag))
    })
    .max_by(|(a_words, a_kw, _), (b_words, b_kw, _)| {
      a_words
        .cmp(b_words)
        .then(a_kw.len().cmp(&b_kw.len()))
        .then(b_kw.cmp(a_kw))
    })
    .map(|(_, _, tag)| tag.clone())
}
