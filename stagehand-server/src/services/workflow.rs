//! Status enums and their transition tables
//!
//! Inventory items, documents and performances each move through a fixed
//! state machine. Repositories call `transition` before writing a new status,
//! which reports an illegal move as a conflict.

use serde::{Deserialize, Serialize};
use stagehand_common::{Error, Result};
use std::fmt;

macro_rules! status_str {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Inventory items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Available,
    Reserved,
    InUse,
    InRepair,
    WrittenOff,
}

status_str!(ItemStatus {
    Available => "AVAILABLE",
    Reserved => "RESERVED",
    InUse => "IN_USE",
    InRepair => "IN_REPAIR",
    WrittenOff => "WRITTEN_OFF",
});

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Available,
        ItemStatus::Reserved,
        ItemStatus::InUse,
        ItemStatus::InRepair,
        ItemStatus::WrittenOff,
    ];

    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Available, Reserved | InUse | InRepair | WrittenOff)
                | (Reserved, Available | InUse)
                | (InUse, Available | InRepair)
                | (InRepair, Available | WrittenOff)
        )
    }

    /// Usable for a performance
    pub fn is_serviceable(self) -> bool {
        matches!(self, ItemStatus::Available | ItemStatus::Reserved | ItemStatus::InUse)
    }
}

/// Kind of inventory movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Receipt,
    Transfer,
    Issue,
    Return,
    Repair,
    WriteOff,
    Reserve,
    Release,
}

status_str!(MovementType {
    Receipt => "RECEIPT",
    Transfer => "TRANSFER",
    Issue => "ISSUE",
    Return => "RETURN",
    Repair => "REPAIR",
    WriteOff => "WRITE_OFF",
    Reserve => "RESERVE",
    Release => "RELEASE",
});

impl MovementType {
    /// Status the item ends up in; None keeps the current status
    pub fn target_status(self) -> Option<ItemStatus> {
        match self {
            MovementType::Receipt | MovementType::Transfer => None,
            MovementType::Issue => Some(ItemStatus::InUse),
            MovementType::Return | MovementType::Release => Some(ItemStatus::Available),
            MovementType::Repair => Some(ItemStatus::InRepair),
            MovementType::WriteOff => Some(ItemStatus::WrittenOff),
            MovementType::Reserve => Some(ItemStatus::Reserved),
        }
    }

    /// Resulting status of applying this movement to an item in `current`
    pub fn apply(self, current: ItemStatus) -> Result<ItemStatus> {
        match self.target_status() {
            None if current == ItemStatus::WrittenOff => Err(Error::Conflict(format!(
                "{} is not possible for a written-off item",
                self
            ))),
            None => Ok(current),
            Some(next) if current.can_transition_to(next) => Ok(next),
            Some(next) => Err(Error::Conflict(format!(
                "{} is not allowed: item status {} cannot change to {}",
                self, current, next
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    InReview,
    Approved,
    Rejected,
    Archived,
}

status_str!(DocumentStatus {
    Draft => "DRAFT",
    InReview => "IN_REVIEW",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Archived => "ARCHIVED",
});

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Draft,
        DocumentStatus::InReview,
        DocumentStatus::Approved,
        DocumentStatus::Rejected,
        DocumentStatus::Archived,
    ];

    pub fn is_editable(self) -> bool {
        self == DocumentStatus::Draft
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, DocumentStatus::Draft | DocumentStatus::Rejected)
    }
}

/// Workflow action requested through the transitions endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentAction {
    Submit,
    Approve,
    Reject,
    Revise,
    Archive,
}

status_str!(DocumentAction {
    Submit => "submit",
    Approve => "approve",
    Reject => "reject",
    Revise => "revise",
    Archive => "archive",
});

impl DocumentAction {
    /// Approve and reject are reviewer decisions
    pub fn is_review(self) -> bool {
        matches!(self, DocumentAction::Approve | DocumentAction::Reject)
    }

    /// New status after applying this action in `current`
    pub fn apply(self, current: DocumentStatus) -> Result<DocumentStatus> {
        use DocumentAction as A;
        use DocumentStatus as S;

        let next = match (self, current) {
            (A::Submit, S::Draft) => S::InReview,
            (A::Approve, S::InReview) => S::Approved,
            (A::Reject, S::InReview) => S::Rejected,
            (A::Revise, S::Rejected) => S::Draft,
            (A::Archive, S::Draft | S::Approved | S::Rejected) => S::Archived,
            _ => {
                return Err(Error::Conflict(format!(
                    "Cannot {} a document in status {}",
                    self, current
                )))
            }
        };
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Performances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceStatus {
    Preparation,
    InRepertoire,
    Paused,
    Archived,
}

status_str!(PerformanceStatus {
    Preparation => "PREPARATION",
    InRepertoire => "IN_REPERTOIRE",
    Paused => "PAUSED",
    Archived => "ARCHIVED",
});

impl PerformanceStatus {
    pub const ALL: [PerformanceStatus; 4] = [
        PerformanceStatus::Preparation,
        PerformanceStatus::InRepertoire,
        PerformanceStatus::Paused,
        PerformanceStatus::Archived,
    ];

    pub fn can_transition_to(self, next: PerformanceStatus) -> bool {
        use PerformanceStatus::*;
        matches!(
            (self, next),
            (Preparation, InRepertoire | Archived)
                | (InRepertoire, Paused | Archived)
                | (Paused, InRepertoire | Archived)
        )
    }

    /// Check a lifecycle move; premiere date is needed to enter the repertoire
    pub fn transition(self, next: PerformanceStatus, has_premiere: bool) -> Result<PerformanceStatus> {
        if !self.can_transition_to(next) {
            return Err(Error::Conflict(format!(
                "Performance status {} cannot change to {}",
                self, next
            )));
        }
        if self == PerformanceStatus::Preparation
            && next == PerformanceStatus::InRepertoire
            && !has_premiere
        {
            return Err(Error::InvalidInput(
                "premiere_date must be set before the performance enters the repertoire".into(),
            ));
        }
        Ok(next)
    }
}
