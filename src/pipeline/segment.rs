//! Response segmenter: split an inference reply into validated JSON documents.
//!
//! The service is instructed to emit one JSON document per table, separated by
//! two line breaks, or the literal reply `no table` when the images hold
//! nothing tabular. Models occasionally disobey the "no code blocks" rule, so
//! an outer markdown fence is stripped before splitting — the same cheap
//! deterministic cleanup the prompt cannot reliably buy.
//!
//! A segment that fails to parse yields a [`SegmentError`] carrying its index
//! and the parser diagnostic; segmenting continues, so one bad segment never
//! discards its siblings. The index is stable across the reply and is the key
//! under which valid segments are persisted.

use crate::error::SegmentError;
use crate::prompts::NO_TABLE_REPLY;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One blank-line-delimited span of the reply that parsed as a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDocument {
    /// Position in split order; the addressable persistence key.
    pub index: usize,
    /// The document text, trimmed, verbatim otherwise.
    pub json: String,
}

/// Whether the reply is the service's explicit "nothing here" signal.
///
/// Matching is trimmed and ASCII-case-insensitive. The upstream contract only
/// promises the exact lowercase marker; the relaxation accepts minor
/// capitalisation drift and should be reconciled against the service's actual
/// behaviour rather than widened further.
pub fn is_no_table_reply(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(NO_TABLE_REPLY)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\n(.*)\n```\s*$").unwrap());

/// Strip a single outer code fence, if the whole reply is wrapped in one.
fn strip_outer_fence(text: &str) -> &str {
    match RE_OUTER_FENCE.captures(text.trim()) {
        Some(caps) => caps.get(1).map_or(text, |m| m.as_str()),
        None => text,
    }
}

/// Split a reply into candidate documents and validate each against JSON.
///
/// The sentinel reply produces an empty sequence — not an error. Otherwise
/// the reply is split on two consecutive newlines, blank segments are
/// dropped, and every remaining segment is parsed with `serde_json`. Output
/// order matches reply order.
pub fn segment_reply(text: &str) -> Vec<Result<CandidateDocument, SegmentError>> {
    if is_no_table_reply(text) {
        debug!("Reply is the no-table sentinel");
        return Vec::new();
    }

    let cleaned = strip_outer_fence(text).replace("\r\n", "\n");

    cleaned
        .split("\n\n")
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .map(|(index, segment)| {
            match serde_json::from_str::<serde_json::Value>(segment) {
                Ok(_) => Ok(CandidateDocument {
                    index,
                    json: segment.to_string(),
                }),
                Err(e) => Err(SegmentError {
                    index,
                    detail: e.to_string(),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_yields_empty_sequence() {
        assert!(segment_reply("no table").is_empty());
        assert!(segment_reply("  No Table \n").is_empty());
        assert!(segment_reply("NO TABLE").is_empty());
    }

    #[test]
    fn sentinel_inside_text_is_not_the_sentinel() {
        let results = segment_reply("{\"note\": \"no table\"}");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn splits_on_blank_lines() {
        let results = segment_reply("{\"a\": 1}\n\n{\"b\": 2}");
        assert_eq!(results.len(), 2);
        let docs: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(docs[0].index, 0);
        assert_eq!(docs[0].json, "{\"a\": 1}");
        assert_eq!(docs[1].index, 1);
        assert_eq!(docs[1].json, "{\"b\": 2}");
    }

    #[test]
    fn invalid_segment_does_not_drop_neighbours() {
        let results = segment_reply("{\"a\": 1}\n\nNOT-VALID\n\n{\"c\": 3}");
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[2].is_ok());

        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.index, 1);
        assert!(!err.detail.is_empty());

        // Valid neighbours keep their own stable indices.
        assert_eq!(results[0].as_ref().unwrap().index, 0);
        assert_eq!(results[2].as_ref().unwrap().index, 2);
    }

    #[test]
    fn extra_blank_lines_are_dropped_not_indexed() {
        let results = segment_reply("{\"a\": 1}\n\n\n\n{\"b\": 2}\n\n");
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].as_ref().unwrap().index, 1);
    }

    #[test]
    fn outer_fence_is_stripped() {
        let fenced = "```json\n{\"a\": 1}\n\n{\"b\": 2}\n```";
        let results = segment_reply(fenced);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn crlf_replies_still_split() {
        let results = segment_reply("{\"a\": 1}\r\n\r\n{\"b\": 2}");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn multiline_documents_survive() {
        let reply = "{\n  \"name\": \"Q1\",\n  \"rows\": [1, 2]\n}\n\n{\"b\": 2}";
        let results = segment_reply(reply);
        assert_eq!(results.len(), 2);
        assert!(results[0].as_ref().unwrap().json.contains("rows"));
    }

    #[test]
    fn empty_reply_yields_nothing() {
        assert!(segment_reply("").is_empty());
        assert!(segment_reply("\n\n\n").is_empty());
    }
}
