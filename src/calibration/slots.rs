//! Slot layout and depth table completeness
//!
//! A machine declares its physical slot count K and optionally a set of
//! retired ids. The depth table must carry exactly one entry for every id in
//! `1..=K` that is not retired: no gaps, no extras.

use std::collections::BTreeSet;

use super::errors::FieldError;

/// Parses an authored table key as a positive integer id.
///
/// Only ASCII digits are accepted, so `"+3"`, `"3.0"` and `" 3"` are rejected.
/// Leading zeros are accepted and normalized, which makes `"07"` collide
/// with `"7"`.
pub fn parse_positive_id(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|id| *id > 0)
}

/// Declared slot ids of one machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    slot_count: u32,
    retired: BTreeSet<u32>,
}

impl SlotLayout {
    pub fn new(slot_count: u32, retired: BTreeSet<u32>) -> Self {
        Self {
            slot_count,
            retired,
        }
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn retired(&self) -> &BTreeSet<u32> {
        &self.retired
    }

    /// Whether a depth offset is expected for `slot`
    pub fn expects(&self, slot: u32) -> bool {
        slot >= 1 && slot <= self.slot_count && !self.retired.contains(&slot)
    }

    /// Expected ids in ascending order
    pub fn expected(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=self.slot_count).filter(move |slot| !self.retired.contains(slot))
    }

    pub fn expected_len(&self) -> usize {
        self.expected().count()
    }

    /// Short description used in error messages, e.g. `1..=162 except 60, 61`.
    pub fn describe(&self) -> String {
        if self.retired.is_empty() {
            format!("1..={}", self.slot_count)
        } else {
            let retired: Vec<String> = self.retired.iter().map(|id| id.to_string()).collect();
            format!("1..={} except {}", self.slot_count, retired.join(", "))
        }
    }

    /// Compares the table's key set against the layout.
    ///
    /// Returns one error per missing id and one per extra id, in id order.
    pub fn check_completeness<'a>(
        &self,
        table: &str,
        keys: impl IntoIterator<Item = &'a u32>,
    ) -> Vec<FieldError> {
        let present: BTreeSet<u32> = keys.into_iter().copied().collect();
        let mut errors = Vec::new();

        for slot in self.expected() {
            if !present.contains(&slot) {
                errors.push(FieldError::missing_slot(table, slot));
            }
        }

        let declared = self.describe();
        for slot in &present {
            if !self.expects(*slot) {
                errors.push(FieldError::extra_slot(table, *slot, &declared));
            }
        }

        errors
    }

    /// Checks retired ids against the slot count.
    pub(crate) fn check_retired(&self, field: &str) -> Vec<FieldError> {
        self.retired
            .iter()
            .filter(|id| **id > self.slot_count)
            .map(|id| {
                FieldError::new(
                    field,
                    id.to_string(),
                    format!("retired slot outside 1..={}", self.slot_count),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "slotDepthOffsets";

    fn keys(ids: impl IntoIterator<Item = u32>) -> Vec<u32> {
        ids.into_iter().collect()
    }

    #[test]
    fn test_parse_positive_id() {
        assert_eq!(parse_positive_id("1"), Some(1));
        assert_eq!(parse_positive_id("162"), Some(162));
        assert_eq!(parse_positive_id("07"), Some(7));
        assert_eq!(parse_positive_id("0"), None);
        assert_eq!(parse_positive_id("-3"), None);
        assert_eq!(parse_positive_id("+3"), None);
        assert_eq!(parse_positive_id("3.0"), None);
        assert_eq!(parse_positive_id(""), None);
        assert_eq!(parse_positive_id("slot1"), None);
        assert_eq!(parse_positive_id("99999999999"), None);
    }

    #[test]
    fn test_complete_table_passes() {
        let layout = SlotLayout::new(162, BTreeSet::new());
        let table = keys(1..=162);
        assert!(layout.check_completeness(TABLE, &table).is_empty());
    }

    #[test]
    fn test_missing_key_cited() {
        let layout = SlotLayout::new(162, BTreeSet::new());
        let table = keys((1..=162).filter(|id| *id != 63));
        let errors = layout.check_completeness(TABLE, &table);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.63");
        assert!(errors[0].constraint.contains("missing key 63"));
    }

    #[test]
    fn test_extra_key_cited() {
        let layout = SlotLayout::new(5, BTreeSet::new());
        let table = keys(1..=6);
        let errors = layout.check_completeness(TABLE, &table);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.6");
        assert!(errors[0].constraint.contains("unexpected key 6"));
    }

    #[test]
    fn test_retired_slots_must_be_absent() {
        let layout = SlotLayout::new(5, BTreeSet::from([3]));
        assert_eq!(layout.expected().collect::<Vec<_>>(), vec![1, 2, 4, 5]);
        assert!(layout.check_completeness(TABLE, &keys([1, 2, 4, 5])).is_empty());

        let errors = layout.check_completeness(TABLE, &keys(1..=5));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "slotDepthOffsets.3");
        assert!(errors[0].constraint.contains("except 3"));
    }

    #[test]
    fn test_missing_and_extra_reported_together() {
        let layout = SlotLayout::new(4, BTreeSet::new());
        let errors = layout.check_completeness(TABLE, &keys([1, 2, 4, 9]));
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["slotDepthOffsets.3", "slotDepthOffsets.9"]);
    }

    #[test]
    fn test_retired_outside_count() {
        let layout = SlotLayout::new(10, BTreeSet::from([4, 11]));
        let errors = layout.check_retired("retiredSlots");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].value, "11");
    }
}
