// ============================================================
// Layer 4 — Per-batch Vocabulary Extension
// ============================================================
// The copy mechanism can emit node tokens that the base input
// vocabulary does not contain. For every batch we clone the
// base vocabulary and append those tokens, giving an extended
// ("oov") vocabulary that lives exactly as long as the batch.
//
//   base vocab   : <P> <s> </s> <UNK> x = ( ) + ...
//   batch nodes  : "tom"  "apples"  "x"
//   oov vocab    : base ... tom apples
//   token_id_oov : [ |V|, |V|+1, idx(x) ]
//
// Only default-typed nodes (type absent or 0) may extend the
// vocabulary. Typed nodes that are unknown resolve to <UNK>.
//
// The same extended vocabulary indexes the node tokens, the
// training targets and the decoded symbols of the batch, so
// all three are carried together in the batch value.

use crate::domain::graph::GraphNode;
use crate::domain::vocab::Vocab;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedVocab {
    pub vocab:        Vocab,
    /// One row per graph: each node's index in `vocab`.
    pub token_id_oov: Vec<Vec<usize>>,
}

/// Build the extended vocabulary for one batch of graphs.
pub fn prepare_ext_vocab<'a, I>(base: &Vocab, graphs: I) -> ExtendedVocab
where
    I: IntoIterator<Item = &'a [GraphNode]>,
{
    let mut vocab = base.clone();
    let graphs: Vec<&[GraphNode]> = graphs.into_iter().collect();

    for node in graphs.iter().flat_map(|g| g.iter()) {
        if node.is_default_type() && !vocab.contains(&node.token) {
            vocab.add_symbol(&node.token);
        }
    }

    let token_id_oov = graphs
        .iter()
        .map(|g| g.iter().map(|n| vocab.get_symbol_idx(&n.token)).collect())
        .collect();

    ExtendedVocab { vocab, token_id_oov }
}

impl ExtendedVocab {
    /// Index `tokens` against the extended vocabulary.
    pub fn index_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        self.vocab.get_symbol_idx_for_list(tokens)
    }
}
