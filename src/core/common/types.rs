//! Core identifier types shared across the crate.

use serde::{Deserialize, Serialize};

/// A log sequence number.
///
/// LSNs are allocated by the storage engine, are unique, and increase
/// strictly monotonically over the lifetime of the database. "No LSN" is
/// expressed as `Option<Lsn>` rather than a sentinel value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Lsn(pub u64);

/// An opaque transaction identifier supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

/// Identifier of a page owned by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsn_ordering_is_numeric() {
        assert!(Lsn(1) < Lsn(2));
        assert!(Lsn(10) > Lsn(9));
        assert_eq!(Lsn(7), Lsn(7));
    }

    #[test]
    fn ids_round_trip_through_json() {
        let lsn: Lsn = serde_json::from_str(&serde_json::to_string(&Lsn(42)).unwrap()).unwrap();
        assert_eq!(lsn, Lsn(42));
        let tx: TransactionId =
            serde_json::from_str(&serde_json::to_string(&TransactionId(3)).unwrap()).unwrap();
        assert_eq!(tx, TransactionId(3));
    }
}
