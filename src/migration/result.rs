use std::ops::AddAssign;

/// Running counters of a migration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationResult {
    pub migrated: usize,
    pub errors: usize,
}

impl MigrationResult {
    pub fn migrated(migrated: usize) -> Self {
        Self { migrated, errors: 0 }
    }

    pub fn processed(&self) -> usize {
        self.migrated + self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl AddAssign for MigrationResult {
    fn add_assign(&mut self, other: Self) {
        self.migrated += other.migrated;
        self.errors += other.errors;
    }
}
