//! Prompts and reply sentinels for the table-extraction request.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the user instruction, the system prompt,
//!    and the "nothing here" sentinel form one contract with the inference
//!    service. Changing the delimiter or the sentinel means touching exactly
//!    one file (the segmenter imports both from here).
//!
//! 2. **Testability** — unit tests can assert the instruction still promises
//!    what the segmenter relies on, without spinning up a real model.
//!
//! Callers can override the system prompt via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constants here are
//! used when no override is provided.

/// Default system prompt for the extraction request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant that extracts all tables \
from images and returns them as individual valid JSON blocks. \
Do not return as a code block.";

/// The per-request user instruction sent alongside the composite images.
///
/// This text is load-bearing for the segmenter: it instructs the model to
/// separate JSON documents with two line breaks (the segmenter's delimiter)
/// and to answer with [`NO_TABLE_REPLY`] when nothing tabular is visible.
pub const USER_INSTRUCTION: &str = "Extract all tables or tabular data from the images to \
valid JSON. Some tables span multiple images. Tables in images could be split horizontally \
or vertically across images. Each table should be a separate JSON document. Separate JSON \
documents by two line breaks. Do not convert table of contents into JSON document. If no \
JSON will be generated, respond only with 'no table'. Do not use code blocks.";

/// The service's explicit "nothing here" reply.
///
/// A reply that trims to this marker means the images held no tabular data —
/// distinct from an empty or malformed payload, and never an error.
pub const NO_TABLE_REPLY: &str = "no table";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_the_delimiter_and_sentinel() {
        assert!(USER_INSTRUCTION.contains("two line breaks"));
        assert!(USER_INSTRUCTION.contains(NO_TABLE_REPLY));
    }

    #[test]
    fn system_prompt_forbids_code_blocks() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("code block"));
    }
}
