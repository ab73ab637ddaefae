// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Splits node tokens, sentence fragments and target trees into
// symbols. Graphs arrive pre-built, so the only text handling
// left is whitespace splitting and optional lowercasing.
//
// The split is done by the `tokenizers` WhitespaceSplit
// pre-tokenizer: it splits on any Unicode whitespace and never
// breaks punctuation off a word, which keeps tree symbols such
// as "(" or "3.5" intact.

use anyhow::{anyhow, Result};
use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    lower_case: bool,
    splitter:   WhitespaceSplit,
}

impl Preprocessor {
    pub fn new(lower_case: bool) -> Self {
        Self { lower_case, splitter: WhitespaceSplit }
    }

    /// Apply the case policy to a single symbol.
    pub fn normalize(&self, token: &str) -> String {
        if self.lower_case {
            token.to_lowercase()
        } else {
            token.to_string()
        }
    }

    /// Split `text` into normalised symbols.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let mut pre = PreTokenizedString::from(self.normalize(text));
        self.splitter
            .pre_tokenize(&mut pre)
            .map_err(|e| anyhow!("whitespace pre-tokenization failed: {e}"))?;

        Ok(pre
            .get_splits(OffsetReferential::Original, OffsetType::Byte)
            .into_iter()
            .map(|(piece, _, _)| piece.to_string())
            .collect())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(true)
    }
}
