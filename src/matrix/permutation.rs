//! Row permutation used to couple device and circuit equations.
//!
//! Bulk equations assemble on their natural rows. Contact equations take
//! over the rows of contact nodes, so the bulk contributions on those rows
//! must be dropped; interface equations move one side's rows onto the
//! other's. A [`PermutationMap`] records where each redirected raw row goes.

use std::collections::BTreeMap;

use crate::error::{Result, TcadError};

use super::{Assembly, RhsEntry, RowColVal};

/// Where a raw row is loaded in the global system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationEntry {
    /// Target row, or `None` when the row is eliminated.
    row: Option<usize>,
    /// Also keep the contribution on the original row.
    keep_copy: bool,
}

impl PermutationEntry {
    /// Drop every contribution to the row.
    pub fn eliminated() -> Self {
        Self {
            row: None,
            keep_copy: false,
        }
    }

    /// Move contributions to `row`.
    pub fn merged(row: usize) -> Self {
        Self {
            row: Some(row),
            keep_copy: false,
        }
    }

    /// Add contributions to `row` and keep them on the original row.
    pub fn copied(row: usize) -> Self {
        Self {
            row: Some(row),
            keep_copy: true,
        }
    }

    pub fn row(&self) -> Option<usize> {
        self.row
    }

    pub fn keep_copy(&self) -> bool {
        self.keep_copy
    }

    pub fn is_eliminated(&self) -> bool {
        self.row.is_none()
    }
}

/// Raw row → [`PermutationEntry`]. Rows absent from the map load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermutationMap {
    entries: BTreeMap<usize, PermutationEntry>,
}

impl PermutationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare what happens to `row`.
    ///
    /// Declaring the same entry twice is a no-op; declaring a different
    /// entry for a row that already has one is a configuration error.
    pub fn insert(&mut self, row: usize, entry: PermutationEntry) -> Result<()> {
        match self.entries.get(&row) {
            Some(existing) if *existing != entry => {
                Err(TcadError::ConflictingPermutation { row })
            }
            Some(_) => Ok(()),
            None => {
                self.entries.insert(row, entry);
                Ok(())
            }
        }
    }

    pub fn get(&self, row: usize) -> Option<&PermutationEntry> {
        self.entries.get(&row)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PermutationEntry)> {
        self.entries.iter().map(|(r, e)| (*r, e))
    }

    /// Rows a contribution on raw row `row` lands on.
    pub fn targets(&self, row: usize) -> Targets {
        match self.entries.get(&row) {
            None => Targets::one(row),
            Some(e) => match (e.row, e.keep_copy) {
                (None, _) => Targets::none(),
                (Some(r), false) => Targets::one(r),
                (Some(r), true) => Targets::two(r, row),
            },
        }
    }

    /// Load `from` into `into`, redirecting rows through the map.
    pub fn permute_into(&self, from: &Assembly, into: &mut Assembly) {
        for e in &from.matrix {
            for r in self.targets(e.row) {
                into.matrix.push(RowColVal::new(r, e.col, e.val));
            }
        }
        for e in &from.rhs {
            for r in self.targets(e.row) {
                into.rhs.push(RhsEntry::new(r, e.val));
            }
        }
    }
}

/// Up to two target rows for one raw row.
#[derive(Debug, Clone, Copy)]
pub struct Targets {
    rows: [usize; 2],
    len: usize,
    pos: usize,
}

impl Targets {
    fn none() -> Self {
        Self {
            rows: [0, 0],
            len: 0,
            pos: 0,
        }
    }

    fn one(r: usize) -> Self {
        Self {
            rows: [r, 0],
            len: 1,
            pos: 0,
        }
    }

    fn two(a: usize, b: usize) -> Self {
        Self {
            rows: [a, b],
            len: 2,
            pos: 0,
        }
    }
}

impl Iterator for Targets {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.pos < self.len {
            let r = self.rows[self.pos];
            self.pos += 1;
            Some(r)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_rows_pass_through() {
        let p = PermutationMap::new();
        assert_eq!(p.targets(4).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_eliminated_and_merged_rows() {
        let mut p = PermutationMap::new();
        p.insert(0, PermutationEntry::eliminated()).unwrap();
        p.insert(1, PermutationEntry::merged(5)).unwrap();
        p.insert(2, PermutationEntry::copied(6)).unwrap();

        let mut raw = Assembly::new();
        raw.add_rhs(0, 1.0);
        raw.add_rhs(1, 2.0);
        raw.add_rhs(2, 3.0);
        raw.add_matrix(1, 0, 4.0);

        let mut out = Assembly::new();
        p.permute_into(&raw, &mut out);
        assert_eq!(out.rhs_dense(7), vec![0.0, 0.0, 3.0, 0.0, 0.0, 2.0, 3.0]);
        assert_eq!(out.matrix, vec![RowColVal::new(5, 0, 4.0)]);
    }

    #[test]
    fn test_redeclaring_is_idempotent() {
        let mut p = PermutationMap::new();
        p.insert(3, PermutationEntry::eliminated()).unwrap();
        p.insert(3, PermutationEntry::eliminated()).unwrap();
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_conflicting_entry_is_rejected() {
        let mut p = PermutationMap::new();
        p.insert(3, PermutationEntry::merged(1)).unwrap();
        let err = p.insert(3, PermutationEntry::merged(2)).unwrap_err();
        assert!(matches!(err, TcadError::ConflictingPermutation { row: 3 }));
    }
}
