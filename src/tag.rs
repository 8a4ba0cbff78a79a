//! Tagging of values crossing the suspension channel.
//!
//! A routine suspends for two different reasons: either it awaits
//! something from the runtime (a trap), or it produces an item for
//! the consumer iterating its generator. Items are wrapped in a
//! [`Tagged`] value so that the [driver] can tell both apart.
//!
//! [driver]: crate::driver

/// A sequence item, marked as such.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tagged<T>(T);

/// What a routine left behind when it suspended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Suspension<T> {
    /// The routine awaits the runtime.
    Trap,

    /// The routine produced an item.
    Tagged(Tagged<T>),
}

impl<T> From<Option<Tagged<T>>> for Suspension<T> {
    fn from(tagged: Option<Tagged<T>>) -> Self {
        match tagged {
            Some(tagged) => Self::Tagged(tagged),
            None => Self::Trap,
        }
    }
}

/// Marks the given value as a sequence item.
pub fn wrap<T>(value: T) -> Tagged<T> {
    Tagged(value)
}

/// Returns `true` if the suspension carries a sequence item.
pub fn is_tagged<T>(suspension: &Suspension<T>) -> bool {
    matches!(suspension, Suspension::Tagged(_))
}

/// Extracts the sequence item.
pub fn unwrap<T>(tagged: Tagged<T>) -> T {
    tagged.0
}

#[cfg(test)]
mod tests {
    use super::{is_tagged, unwrap, wrap, Suspension};

    #[test]
    fn classify() {
        let trap: Suspension<u8> = None.into();
        assert_eq!(trap, Suspension::Trap);
        assert!(!is_tagged(&trap));

        let item: Suspension<u8> = Some(wrap(42)).into();
        assert!(is_tagged(&item));

        let Suspension::Tagged(tagged) = item else {
            unreachable!("expected a tagged item");
        };

        assert_eq!(unwrap(tagged), 42);
    }
}
