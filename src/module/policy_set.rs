//! The set of compiled policy tables published together.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::index::UsersTable;
use crate::module::Phase;

/// Every table built by one load or reload.
#[derive(Debug)]
pub struct PolicySet {
    generation: u64,
    common: Option<UsersTable>,
    phases: [Option<UsersTable>; 4],
}

impl PolicySet {
    pub(crate) fn new(generation: u64, common: Option<UsersTable>, phases: [Option<UsersTable>; 4]) -> Self {
        Self {
            generation,
            common,
            phases,
        }
    }

    /// Starts at 1 and increases by one on every successful reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Table for a phase: the phase's own file, else the common file.
    pub fn table(&self, phase: Phase) -> Option<&UsersTable> {
        self.phases[phase.slot()].as_ref().or(self.common.as_ref())
    }

    /// Every distinct table, common first.
    pub fn tables(&self) -> impl Iterator<Item = &UsersTable> {
        self.common.iter().chain(self.phases.iter().flatten())
    }

    /// Every file read to build this set, without duplicates.
    pub fn sources(&self) -> Vec<PathBuf> {
        let files: BTreeSet<&PathBuf> = self.tables().flat_map(UsersTable::sources).collect();
        files.into_iter().cloned().collect()
    }

    /// Total entries across all tables.
    pub fn entries(&self) -> usize {
        self.tables().map(UsersTable::entries).sum()
    }
}
