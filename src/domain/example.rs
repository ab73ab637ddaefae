// ============================================================
// Layer 3 — Example Domain Types
// ============================================================
// The two kinds of raw example this crate consumes:
//
//   MwpExample — a math word problem: its pre-built graph plus
//                the target expression tree, linearised as a
//                space-separated, parenthesised string.
//
//   KgRecord   — one knowledge-graph completion query, in the
//                JSON-lines layout of the e1rel_to_e2 files:
//                  e1, rel        → predict e2 (tail direction)
//                  e2, rel_eval   → predict e1 (head direction)
//                  e2_multi1      → every known tail for (e1, rel)
//                  e2_multi2      → every known head for (e2, rel_eval)

use serde::{Deserialize, Serialize};

use crate::domain::graph::GraphData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MwpExample {
    pub graph:  GraphData,
    pub output: String,
}

/// Marker used by training records that have no single `e2`.
pub const NO_ENTITY: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KgRecord {
    pub e1:  String,
    #[serde(default = "no_entity")]
    pub e2:  String,
    pub rel: String,
    #[serde(default = "no_entity")]
    pub rel_eval: String,
    #[serde(default)]
    pub e2_multi1: String,
    #[serde(default)]
    pub e2_multi2: String,
}

fn no_entity() -> String {
    NO_ENTITY.to_string()
}

impl KgRecord {
    /// The tail entity, if the record names one.
    pub fn tail(&self) -> Option<&str> {
        if self.e2 == NO_ENTITY || self.e2.is_empty() { None } else { Some(&self.e2) }
    }

    /// The reverse relation, if the record names one.
    pub fn reverse_relation(&self) -> Option<&str> {
        if self.rel_eval == NO_ENTITY || self.rel_eval.is_empty() { None } else { Some(&self.rel_eval) }
    }

    pub fn known_tails(&self) -> impl Iterator<Item = &str> {
        self.e2_multi1.split_whitespace().filter(|&e| e != NO_ENTITY)
    }

    pub fn known_heads(&self) -> impl Iterator<Item = &str> {
        self.e2_multi2.split_whitespace().filter(|&e| e != NO_ENTITY)
    }

    /// Every entity name mentioned anywhere in the record.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.e1.as_str())
            .chain(self.tail())
            .chain(self.known_tails())
            .chain(self.known_heads())
    }

    /// Every relation name mentioned in the record.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.rel.as_str()).chain(self.reverse_relation())
    }

    /// Lowercase every name in place. The "None" marker survives,
    /// whole-field or inside a space-separated list.
    pub fn lowercase(&mut self) {
        for field in [
            &mut self.e1, &mut self.e2, &mut self.rel,
            &mut self.rel_eval, &mut self.e2_multi1, &mut self.e2_multi2,
        ] {
            *field = field
                .split_whitespace()
                .map(|name| if name == NO_ENTITY { name.to_string() } else { name.to_lowercase() })
                .collect::<Vec<_>>()
                .join(" ");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinship_query_parses() {
        let r: KgRecord = serde_json::from_str(
            r#"{"e1": "person84", "e2": "person85", "rel": "term21",
                "rel_eval": "term21_reverse", "e2_multi1": "person85",
                "e2_multi2": "person84 person55 person74"}"#,
        )
        .unwrap();
        assert_eq!(r.tail(), Some("person85"));
        assert_eq!(r.reverse_relation(), Some("term21_reverse"));
        assert_eq!(r.known_heads().count(), 3);
        assert_eq!(r.relations().count(), 2);
    }

    #[test]
    fn test_training_record_without_tail() {
        let r: KgRecord = serde_json::from_str(
            r#"{"e1": "person1", "e2": "None", "rel": "term3", "e2_multi1": "person2 person9"}"#,
        )
        .unwrap();
        assert_eq!(r.tail(), None);
        assert_eq!(r.reverse_relation(), None);
        let entities: Vec<&str> = r.entities().collect();
        assert_eq!(entities, vec!["person1", "person2", "person9"]);
    }

    #[test]
    fn test_lowercase_keeps_none_marker() {
        let mut r = KgRecord {
            e1: "Person1".into(),
            e2: NO_ENTITY.into(),
            rel: "Term3".into(),
            rel_eval: NO_ENTITY.into(),
            e2_multi1: "Person2".into(),
            e2_multi2: String::new(),
        };
        r.lowercase();
        assert_eq!(r.e1, "person1");
        assert_eq!(r.e2, NO_ENTITY);
        assert_eq!(r.e2_multi1, "person2");
    }

    #[test]
    fn test_lowercase_keeps_none_inside_lists() {
        let mut r = KgRecord {
            e1: "Person1".into(),
            e2: "Person2".into(),
            rel: "Term3".into(),
            rel_eval: "Term3_reverse".into(),
            e2_multi1: "Person2 None Person7".into(),
            e2_multi2: "None Person1".into(),
        };
        r.lowercase();
        assert_eq!(r.e2_multi1, "person2 None person7");
        let tails: Vec<&str> = r.known_tails().collect();
        assert_eq!(tails, vec!["person2", "person7"]);
        let heads: Vec<&str> = r.known_heads().collect();
        assert_eq!(heads, vec!["person1"]);
    }
}
