// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// A bidirectional mapping between symbols and integer indices.
//
// The first four indices are reserved:
//   0  <P>     padding
//   1  <s>     start of decoded sequence
//   2  </s>    end of decoded sequence
//   3  <UNK>   anything not in the vocabulary
//
// Looking up a missing symbol returns the <UNK> index rather
// than failing, so callers can compare against `unk_idx()` to
// detect out-of-vocabulary tokens.
//
// Serialised as a plain JSON list of symbols in index order;
// the reverse map is rebuilt on load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const PAD_TOKEN: &str = "<P>";
pub const SOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";
pub const UNK_TOKEN: &str = "<UNK>";

pub const PAD_IDX: usize = 0;
pub const SOS_IDX: usize = 1;
pub const EOS_IDX: usize = 2;
pub const UNK_IDX: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocab {
    symbol2idx: HashMap<String, usize>,
    idx2symbol: Vec<String>,
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocab {
    /// A vocabulary holding only the four reserved symbols.
    pub fn new() -> Self {
        let mut vocab = Self {
            symbol2idx: HashMap::new(),
            idx2symbol: Vec::new(),
        };
        for special in [PAD_TOKEN, SOS_TOKEN, EOS_TOKEN, UNK_TOKEN] {
            vocab.add_symbol(special);
        }
        vocab
    }

    /// Build from symbol counts, keeping symbols seen at least
    /// `min_freq` times. Order is by descending count, then
    /// lexicographic, so the same corpus always yields the same
    /// indices.
    pub fn from_counts(counts: &HashMap<String, usize>, min_freq: usize) -> Self {
        let mut entries: Vec<(&String, &usize)> = counts
            .iter()
            .filter(|(_, &c)| c >= min_freq)
            .collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let mut vocab = Self::new();
        for (symbol, _) in entries {
            vocab.add_symbol(symbol);
        }
        vocab
    }

    /// Add a symbol if absent. Returns its index either way.
    pub fn add_symbol(&mut self, symbol: &str) -> usize {
        if let Some(&idx) = self.symbol2idx.get(symbol) {
            return idx;
        }
        let idx = self.idx2symbol.len();
        self.idx2symbol.push(symbol.to_string());
        self.symbol2idx.insert(symbol.to_string(), idx);
        idx
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbol2idx.contains_key(symbol)
    }

    /// Index of `symbol`, or the <UNK> index when absent.
    pub fn get_symbol_idx(&self, symbol: &str) -> usize {
        self.symbol2idx.get(symbol).copied().unwrap_or(UNK_IDX)
    }

    /// Index of `symbol` only if it is really present.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbol2idx.get(symbol).copied()
    }

    pub fn get_symbol_idx_for_list<S: AsRef<str>>(&self, symbols: &[S]) -> Vec<usize> {
        symbols
            .iter()
            .map(|s| self.get_symbol_idx(s.as_ref()))
            .collect()
    }

    pub fn symbol(&self, idx: usize) -> Option<&str> {
        self.idx2symbol.get(idx).map(String::as_str)
    }

    /// Symbols for `indices`; out-of-range indices render as <UNK>.
    pub fn symbols_for<'a>(&'a self, indices: &[usize]) -> Vec<&'a str> {
        indices
            .iter()
            .map(|&i| self.symbol(i).unwrap_or(UNK_TOKEN))
            .collect()
    }

    pub fn unk_idx(&self) -> usize {
        UNK_IDX
    }

    pub fn len(&self) -> usize {
        self.idx2symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2symbol.is_empty()
    }
}

impl From<Vec<String>> for Vocab {
    fn from(idx2symbol: Vec<String>) -> Self {
        let symbol2idx = idx2symbol
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { symbol2idx, idx2symbol }
    }
}

impl From<Vocab> for Vec<String> {
    fn from(vocab: Vocab) -> Self {
        vocab.idx2symbol
    }
}

// ─── VocabModel ──────────────────────────────────────────────────────────────
/// Every vocabulary one dataset needs.
///
/// For MWP, `in_word_vocab` covers node tokens and sentence words,
/// `out_word_vocab` the decoded tree symbols and `edge_vocab` the
/// AMR edge labels. With `share_vocab` the input and output
/// vocabularies are the same value.
///
/// For KG completion, `in_word_vocab` holds entities,
/// `out_word_vocab` relations, and `edge_vocab` is unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabModel {
    pub in_word_vocab:  Vocab,
    pub out_word_vocab: Vocab,
    #[serde(default)]
    pub edge_vocab:     Vec<String>,
    pub share_vocab:    bool,
}

impl VocabModel {
    /// Index of an edge label, if known.
    pub fn edge_idx(&self, label: &str) -> Option<usize> {
        self.edge_vocab.iter().position(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specials_have_fixed_indices() {
        let v = Vocab::new();
        assert_eq!(v.get_symbol_idx(PAD_TOKEN), PAD_IDX);
        assert_eq!(v.get_symbol_idx(SOS_TOKEN), SOS_IDX);
        assert_eq!(v.get_symbol_idx(EOS_TOKEN), EOS_IDX);
        assert_eq!(v.get_symbol_idx(UNK_TOKEN), UNK_IDX);
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_missing_symbol_maps_to_unk() {
        let v = Vocab::new();
        assert_eq!(v.get_symbol_idx("apple"), v.unk_idx());
        assert_eq!(v.index_of("apple"), None);
    }

    #[test]
    fn test_from_counts_respects_min_freq_and_order() {
        let counts: HashMap<String, usize> = [("b", 3), ("a", 3), ("c", 1), ("d", 5)]
            .into_iter()
            .map(|(s, c)| (s.to_string(), c))
            .collect();
        let v = Vocab::from_counts(&counts, 2);
        assert_eq!(v.len(), 7);
        assert_eq!(v.symbol(4), Some("d"));
        assert_eq!(v.symbol(5), Some("a"));
        assert_eq!(v.symbol(6), Some("b"));
        assert!(!v.contains("c"));
    }

    #[test]
    fn test_add_symbol_is_idempotent() {
        let mut v = Vocab::new();
        let first = v.add_symbol("x");
        let again = v.add_symbol("x");
        assert_eq!(first, again);
        assert_eq!(v.len(), 5);
    }

    #[test]
    fn test_json_roundtrip_rebuilds_reverse_map() {
        let mut v = Vocab::new();
        v.add_symbol("(");
        v.add_symbol(")");
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.starts_with('['));
        let back: Vocab = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_symbol_idx(")"), 5);
        assert_eq!(back, v);
    }
}
