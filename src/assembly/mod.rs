//! # Assembly
//!
//! Writes ordered dispatch results back into components. Three strategies:
//!
//! - **Single**: `results[i]` goes to `dst[0][i]`
//! - **Tuple**: element `j` of `results[i]` goes to `dst[j][i]`
//! - **Filtering**: drops skipped items, shrinking the index and every
//!   component in lockstep; hard failures among kept items abort
//!
//! All checks run before the first write, so a failed assembly leaves the
//! batch exactly as it was.

pub mod assembler;

pub use assembler::Assembler;

use crate::components::ComponentStore;

/// Assembly strategy applied to a dispatch's results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assembly {
    Single,
    Tuple,
    Filtering,
}

impl Assembly {
    pub fn as_str(&self) -> &'static str {
        match self {
            Assembly::Single => "single",
            Assembly::Tuple => "tuple",
            Assembly::Filtering => "filtering",
        }
    }
}

/// Result of a successful assembly
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Components were written; `dropped` items were filtered out
    Assembled { kept: usize, dropped: usize },
    /// Every item skipped. The batch was left untouched and should be treated
    /// as empty by the rest of the pipeline stage.
    Empty,
}

impl BatchStatus {
    pub fn is_empty(&self) -> bool {
        matches!(self, BatchStatus::Empty)
    }

    pub fn kept(&self) -> usize {
        match self {
            BatchStatus::Assembled { kept, .. } => *kept,
            BatchStatus::Empty => 0,
        }
    }

    pub fn dropped(&self) -> usize {
        match self {
            BatchStatus::Assembled { dropped, .. } => *dropped,
            BatchStatus::Empty => 0,
        }
    }
}

/// Per-item values that can be split across `ARITY` components
pub trait ComponentTuple: Sized + Send + 'static {
    const ARITY: usize;

    /// Unzip `rows` into columns and store column `j` under `dst[j]`.
    /// `dst.len()` must equal `ARITY`.
    fn write_columns(rows: Vec<Self>, dst: &[String], store: &mut ComponentStore);
}

macro_rules! impl_component_tuple {
    ($arity:expr; $($T:ident $col:ident $idx:tt),+) => {
        impl<$($T: Clone + Send + Sync + 'static),+> ComponentTuple for ($($T,)+) {
            const ARITY: usize = $arity;

            fn write_columns(rows: Vec<Self>, dst: &[String], store: &mut ComponentStore) {
                $(let mut $col: Vec<$T> = Vec::with_capacity(rows.len());)+
                for row in rows {
                    $($col.push(row.$idx);)+
                }
                $(store.insert(&dst[$idx], $col);)+
            }
        }
    };
}

impl_component_tuple!(1; A a 0);
impl_component_tuple!(2; A a 0, B b 1);
impl_component_tuple!(3; A a 0, B b 1, C c 2);
impl_component_tuple!(4; A a 0, B b 1, C c 2, D d 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_columns() {
        let mut store = ComponentStore::new();
        let rows = vec![(1_u8, "a".to_string()), (2, "b".to_string())];
        <(u8, String)>::write_columns(rows, &["n".to_string(), "s".to_string()], &mut store);
        assert_eq!(store.get::<u8>("n").unwrap(), &[1, 2]);
        assert_eq!(store.get::<String>("s").unwrap(), &["a", "b"]);
    }

    #[test]
    fn test_arity() {
        assert_eq!(<(u8,)>::ARITY, 1);
        assert_eq!(<(u8, u8, u8, u8)>::ARITY, 4);
    }

    #[test]
    fn test_status_accessors() {
        let status = BatchStatus::Assembled { kept: 2, dropped: 1 };
        assert!(!status.is_empty());
        assert_eq!((status.kept(), status.dropped()), (2, 1));
        assert!(BatchStatus::Empty.is_empty());
    }
}
