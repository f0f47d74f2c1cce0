use crate::core::{CastFn, Result, Value, ValueKind};

/// Outcome of a tracked set: either write the (possibly cast) value into
/// the slot, or skip the write entirely for a same-object reassignment.
#[derive(Debug)]
pub enum SetDecision {
    Write { value: Value, marks_dirty: bool },
    Skip,
}

/// Decides on each mutation whether the snapshot has diverged from disk.
/// Pure logic, no I/O. Nested in-place mutation of list or map values held
/// outside the store is beyond its reach; tracking is best effort with
/// O(1) amortized cost per set.
pub struct ChangeTracker {
    pub track_changes: bool,
    pub auto_cast: bool,
    pub cast: CastFn,
}

impl ChangeTracker {
    /// Coerce incoming text back to the type of the value it replaces.
    /// Only fires when auto-cast is on, the slot holds a non-text value and
    /// the incoming value is text. A failed cast aborts the whole set
    /// before the slot is touched.
    fn maybe_cast(&self, existing: Option<&Value>, value: Value) -> Result<Value> {
        if !self.auto_cast {
            return Ok(value);
        }
        match (existing, &value) {
            (Some(existing), Value::Text(text)) if !existing.is_text() => {
                (self.cast)(text, existing.type_tag())
            }
            _ => Ok(value),
        }
    }

    pub fn on_set(
        &self,
        existing: Option<&Value>,
        already_dirty: bool,
        value: Value,
    ) -> Result<SetDecision> {
        if !self.track_changes {
            // Tracking off: no analysis, but casting still applies.
            let value = self.maybe_cast(existing, value)?;
            return Ok(SetDecision::Write {
                value,
                marks_dirty: false,
            });
        }

        let Some(existing) = existing else {
            // A new key is always a change; no cast target exists yet.
            return Ok(SetDecision::Write {
                value,
                marks_dirty: true,
            });
        };

        let value = self.maybe_cast(Some(existing), value)?;

        if already_dirty {
            // Once dirty, comparison buys nothing until the next save.
            return Ok(SetDecision::Write {
                value,
                marks_dirty: false,
            });
        }

        if value.same_object(existing) {
            // Reassigned the very same object. Not a change.
            return Ok(SetDecision::Skip);
        }

        let marks_dirty = match value.kind() {
            ValueKind::Immutable | ValueKind::MutableEq => existing != &value,
            // No safe equality. Correctness over precision.
            ValueKind::Opaque => true,
        };

        Ok(SetDecision::Write { value, marks_dirty })
    }

    /// Removals are always a change; no comparison needed.
    pub fn on_delete(&self) -> bool {
        self.track_changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StoreError, default_cast};

    fn tracker(auto_cast: bool) -> ChangeTracker {
        ChangeTracker {
            track_changes: true,
            auto_cast,
            cast: default_cast,
        }
    }

    #[test]
    fn test_new_key_always_dirties() {
        let decision = tracker(false)
            .on_set(None, false, Value::Integer(1))
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: true,
                ..
            }
        ));
    }

    #[test]
    fn test_equal_value_does_not_dirty() {
        let existing = Value::Integer(5);
        let decision = tracker(false)
            .on_set(Some(&existing), false, Value::Integer(5))
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: false,
                ..
            }
        ));
    }

    #[test]
    fn test_unequal_value_dirties() {
        let existing = Value::Integer(5);
        let decision = tracker(false)
            .on_set(Some(&existing), false, Value::Integer(6))
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: true,
                ..
            }
        ));
    }

    #[test]
    fn test_same_object_skips() {
        let existing = Value::opaque("blob", &vec![1u8, 2]).unwrap();
        let decision = tracker(false)
            .on_set(Some(&existing), false, existing.clone())
            .unwrap();
        assert!(matches!(decision, SetDecision::Skip));
    }

    #[test]
    fn test_opaque_with_new_identity_dirties() {
        let existing = Value::opaque("blob", &vec![1u8, 2]).unwrap();
        let incoming = Value::opaque("blob", &vec![1u8, 2]).unwrap();
        let decision = tracker(false)
            .on_set(Some(&existing), false, incoming)
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: true,
                ..
            }
        ));
    }

    #[test]
    fn test_already_dirty_skips_comparison_but_writes() {
        let existing = Value::Integer(5);
        let decision = tracker(false)
            .on_set(Some(&existing), true, Value::Integer(5))
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: false,
                ..
            }
        ));
    }

    #[test]
    fn test_cast_rehydrates_text_before_comparing() {
        let existing = Value::Integer(5);
        let decision = tracker(true)
            .on_set(Some(&existing), false, Value::from("7"))
            .unwrap();
        match decision {
            SetDecision::Write { value, marks_dirty } => {
                assert_eq!(value, Value::Integer(7));
                assert!(marks_dirty);
            }
            SetDecision::Skip => panic!("expected a write"),
        }
    }

    #[test]
    fn test_cast_to_equal_value_does_not_dirty() {
        let existing = Value::Integer(5);
        let decision = tracker(true)
            .on_set(Some(&existing), false, Value::from("5"))
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: false,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_cast_aborts_set() {
        let existing = Value::Integer(5);
        let result = tracker(true).on_set(Some(&existing), false, Value::from("not a number"));
        assert!(matches!(result, Err(StoreError::Cast(_))));
    }

    #[test]
    fn test_cast_applies_even_when_tracking_disabled() {
        let tracker = ChangeTracker {
            track_changes: false,
            auto_cast: true,
            cast: default_cast,
        };
        let existing = Value::Integer(5);
        let decision = tracker
            .on_set(Some(&existing), false, Value::from("9"))
            .unwrap();
        match decision {
            SetDecision::Write { value, marks_dirty } => {
                assert_eq!(value, Value::Integer(9));
                assert!(!marks_dirty);
            }
            SetDecision::Skip => panic!("expected a write"),
        }
    }

    #[test]
    fn test_text_over_text_is_not_cast() {
        let existing = Value::from("old");
        let decision = tracker(true)
            .on_set(Some(&existing), false, Value::from("123"))
            .unwrap();
        match decision {
            SetDecision::Write { value, marks_dirty } => {
                assert_eq!(value, Value::from("123"));
                assert!(marks_dirty);
            }
            SetDecision::Skip => panic!("expected a write"),
        }
    }

    #[test]
    fn test_delete_dirties_only_under_tracking() {
        assert!(tracker(false).on_delete());
        let untracked = ChangeTracker {
            track_changes: false,
            auto_cast: false,
            cast: default_cast,
        };
        assert!(!untracked.on_delete());
    }

    #[test]
    fn test_mutable_values_compare_by_equality() {
        let existing = Value::List(vec![Value::Integer(1)]);
        let same = Value::List(vec![Value::Integer(1)]);
        let decision = tracker(false).on_set(Some(&existing), false, same).unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: false,
                ..
            }
        ));

        let different = Value::List(vec![Value::Integer(2)]);
        let decision = tracker(false)
            .on_set(Some(&existing), false, different)
            .unwrap();
        assert!(matches!(
            decision,
            SetDecision::Write {
                marks_dirty: true,
                ..
            }
        ));
    }
}
