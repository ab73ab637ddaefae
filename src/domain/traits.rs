// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer loads data through these traits, so
// a loader for a new on-disk layout only has to implement
// them.

use anyhow::Result;

/// A dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test  => "test",
        }
    }
}

// ─── ExampleSource ───────────────────────────────────────────────────────────
/// Any component that can load examples for a split.
///
/// Implementations:
///   - MawpsLoader → JSON-lines files of pre-built graphs
///   - KgLoader    → e1rel_to_e2 JSON-lines files
pub trait ExampleSource {
    type Example;

    /// Whether the source has data for `split` at all.
    fn has_split(&self, split: Split) -> bool;

    /// Load every example of `split`.
    fn load_split(&self, split: Split) -> Result<Vec<Self::Example>>;
}
