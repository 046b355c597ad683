//! Retention of fields the descriptor does not recognize.
//!
//! Parsing keeps every unrecognized field as a raw `(number, wire type,
//! bytes)` triple in encounter order, and serialization re-emits the triples
//! verbatim. That gives loss-less round trips across schema versions: a
//! binary written with a newer schema survives a parse/serialize cycle
//! through an older one.

use crate::wire::WireType;
use bytes::Bytes;

/// A single unrecognized field, exactly as it appeared on the wire.
///
/// `bytes` holds everything after the tag: the varint bytes, the fixed-width
/// value, the length prefix plus payload, or a group body including its
/// END_GROUP tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    /// Field number from the tag
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Raw payload bytes as consumed
    pub bytes: Bytes,
}

/// Ordered collection of unrecognized fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFieldSet {
    entries: Vec<UnknownField>,
}

impl UnknownFieldSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no unrecognized fields were retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of retained fields
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in original encounter order
    pub fn iter(&self) -> impl Iterator<Item = &UnknownField> {
        self.entries.iter()
    }

    /// Remove and return every entry recorded for `number`, preserving the
    /// relative order of the rest.
    ///
    /// This is the claim hook for a typed accessor layer: once a generated
    /// accessor interprets a number, its raw bytes leave the unknown set.
    pub fn take(&mut self, number: u32) -> Vec<UnknownField> {
        let mut taken = Vec::new();
        self.entries.retain(|entry| {
            if entry.number == number {
                taken.push(entry.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    pub(crate) fn push(&mut self, field: UnknownField) {
        self.entries.push(field);
    }

    pub(crate) fn extend(&mut self, other: UnknownFieldSet) {
        self.entries.extend(other.entries);
    }
}
