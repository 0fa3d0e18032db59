//! The change journal: the sole source of truth for
//! reporting and for telling the Service Orchestrator which configs were
//! modified.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ScalarConflict,
    TypeConflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub config: String,
    pub section: String,
    pub option: String,
    pub existing_value: Option<String>,
    pub new_value: Option<String>,
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    MergeConfig {
        config: String,
        overlay_path: String,
        live_path: String,
        conflict_count: usize,
    },
    RemoveConfig {
        config: String,
        overlay_path: String,
        live_path: String,
        removed_count: usize,
    },
    SaveConfig {
        config: String,
    },
    Conflict(Conflict),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    records: Vec<JournalRecord>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: JournalRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[JournalRecord] {
        &self.records
    }

    pub fn conflicts(&self) -> Vec<&Conflict> {
        self.records
            .iter()
            .filter_map(|r| match r {
                JournalRecord::Conflict(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn extend(&mut self, other: Journal) {
        self.records.extend(other.records);
    }
}
