use crate::layout::ByteRange;
use crate::property::{ExistingRecord, PropertyRecord};
use crate::scan;

use super::error::CoreError;
use super::request::RequestedSetting;

/// Where successive new records land relative to the anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertionOrder {
    /// Every record is spliced at the anchor offset, so the last requested
    /// setting ends up first. Byte-compatible with the original tool.
    #[default]
    Reversed,
    /// Records follow the anchor in request order.
    RequestOrder,
}

impl InsertionOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reversed => "reversed",
            Self::RequestOrder => "request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingAction {
    /// A record for the key is already on disk and is left untouched.
    /// `record` is `None` when the bytes around the key could not be described.
    KeepExisting {
        key_offset: usize,
        record: Option<ExistingRecord>,
    },
    /// No record on disk and the requested value is the implied default.
    AlreadyDefault,
    Insert(PropertyRecord),
}

impl SettingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepExisting { .. } => "keep_existing",
            Self::AlreadyDefault => "already_default",
            Self::Insert(_) => "insert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingOutcome {
    pub name: String,
    pub requested: RequestedSetting,
    pub action: SettingAction,
}

/// Per-setting decisions for one buffer, computed before anything is modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    pub anchor: ByteRange,
    pub insertion_offset: usize,
    pub outcomes: Vec<SettingOutcome>,
}

impl PatchPlan {
    pub fn has_changes(&self) -> bool {
        self.insertions().next().is_some()
    }

    pub fn insertions(&self) -> impl Iterator<Item = &PropertyRecord> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.action {
            SettingAction::Insert(record) => Some(record),
            _ => None,
        })
    }

    pub fn inserted_len(&self) -> usize {
        self.insertions().map(PropertyRecord::encoded_len).sum()
    }

    /// Splice every planned record into a copy of `buffer`.
    ///
    /// Returns `None` when the plan inserts nothing.
    pub fn apply(&self, buffer: &[u8], order: InsertionOrder) -> Result<Option<Vec<u8>>, CoreError> {
        if !self.has_changes() {
            return Ok(None);
        }

        let mut out = Vec::with_capacity(buffer.len() + self.inserted_len());
        out.extend_from_slice(buffer);

        let mut offset = self.insertion_offset;
        for record in self.insertions() {
            scan::splice_at(&mut out, offset, record.as_bytes())?;
            if order == InsertionOrder::RequestOrder {
                offset += record.encoded_len();
            }
        }
        Ok(Some(out))
    }
}
