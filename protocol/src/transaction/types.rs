//! The transaction category matrix.
//!
//! Every transaction carries a two-level tag: a [`TxMajor`] naming the broad
//! intent (value transfer, network governance, equity management, ...) and a
//! [`TxMinor`] naming the concrete operation inside it. Only a fixed set of
//! `(major, minor)` pairs is meaningful. [`Category`] can only be built from
//! one of those pairs, so an invalid combination is rejected at construction
//! instead of being silently treated as a plain transfer further down.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::verification::TransactionError;

// ---------------------------------------------------------------------------
// RecipientPolicy
// ---------------------------------------------------------------------------

/// Whether a category needs a recipient address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecipientPolicy {
    /// The operation targets a specific address and cannot run without one.
    Required,
    /// The operation is self-contained. A recipient is an error.
    Forbidden,
    /// A recipient means transfer/invocation, no recipient means contract
    /// creation.
    CreationAllowed,
}

// ---------------------------------------------------------------------------
// TxMajor
// ---------------------------------------------------------------------------

/// Broad intent of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxMajor {
    /// Plain value transfer, contract call or contract creation.
    Normal,
    /// Network-level governance: validators, system contracts, votes.
    SystemBase,
    /// Per-user contract registration and cancellation.
    UserBase,
    /// Equity-like holdings and their manager.
    Stock,
    /// Opaque word/data attachments addressed by transaction hash.
    Extra,
}

impl TxMajor {
    /// Every major, in wire order.
    pub const ALL: [TxMajor; 5] = [
        Self::Normal,
        Self::SystemBase,
        Self::UserBase,
        Self::Stock,
        Self::Extra,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::SystemBase => 1,
            Self::UserBase => 2,
            Self::Stock => 3,
            Self::Extra => 4,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_u8() == value)
    }

    /// Recipient rule for this major.
    pub fn recipient_policy(self) -> RecipientPolicy {
        match self {
            Self::Normal => RecipientPolicy::CreationAllowed,
            Self::SystemBase | Self::UserBase | Self::Stock => RecipientPolicy::Required,
            Self::Extra => RecipientPolicy::Forbidden,
        }
    }

    /// The minors that may accompany this major.
    pub fn minors(self) -> &'static [TxMinor] {
        use TxMinor::*;
        match self {
            Self::Normal => &[Empty],
            Self::SystemBase => &[
                SetValidator,
                SetSystemContract,
                RegisterCandidate,
                VoteUser,
                VoteCancel,
                VoteEpoch,
            ],
            Self::UserBase => &[SetUserContract, CancelUserContract],
            Self::Stock => &[
                SetStockManager,
                StockSet,
                StockTransfer,
                StockFreeze,
                StockUnfreeze,
                StockClean,
            ],
            Self::Extra => &[Word, Data],
        }
    }
}

impl fmt::Display for TxMajor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::SystemBase => write!(f, "SystemBase"),
            Self::UserBase => write!(f, "UserBase"),
            Self::Stock => write!(f, "Stock"),
            Self::Extra => write!(f, "Extra"),
        }
    }
}

// ---------------------------------------------------------------------------
// TxMinor
// ---------------------------------------------------------------------------

/// Concrete operation within a major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxMinor {
    /// Unused minor of `Normal` transactions.
    Empty,
    SetValidator,
    SetSystemContract,
    RegisterCandidate,
    VoteUser,
    VoteCancel,
    VoteEpoch,
    SetUserContract,
    CancelUserContract,
    SetStockManager,
    StockSet,
    StockTransfer,
    StockFreeze,
    StockUnfreeze,
    StockClean,
    Word,
    Data,
}

impl TxMinor {
    pub const ALL: [TxMinor; 17] = [
        Self::Empty,
        Self::SetValidator,
        Self::SetSystemContract,
        Self::RegisterCandidate,
        Self::VoteUser,
        Self::VoteCancel,
        Self::VoteEpoch,
        Self::SetUserContract,
        Self::CancelUserContract,
        Self::SetStockManager,
        Self::StockSet,
        Self::StockTransfer,
        Self::StockFreeze,
        Self::StockUnfreeze,
        Self::StockClean,
        Self::Word,
        Self::Data,
    ];

    /// Wire discriminant. Minors are numbered globally, not per major.
    pub fn as_u8(self) -> u8 {
        // ALL is declared in discriminant order.
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

impl fmt::Display for TxMinor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A validated `(major, minor)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCategory", into = "RawCategory")]
pub struct Category {
    major: TxMajor,
    minor: TxMinor,
}

/// Unchecked serde shape of [`Category`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawCategory {
    major: TxMajor,
    minor: TxMinor,
}

impl Category {
    /// Plain transfer / call / creation.
    pub const NORMAL: Category = Category {
        major: TxMajor::Normal,
        minor: TxMinor::Empty,
    };

    /// Builds a category, rejecting pairs outside the matrix.
    pub fn new(major: TxMajor, minor: TxMinor) -> Result<Self, TransactionError> {
        if major.minors().contains(&minor) {
            Ok(Self { major, minor })
        } else {
            Err(TransactionError::UnknownCategory {
                major: major.as_u8(),
                minor: minor.as_u8(),
            })
        }
    }

    /// Builds a category from wire discriminants.
    pub fn from_raw(major: u8, minor: u8) -> Result<Self, TransactionError> {
        let unknown = TransactionError::UnknownCategory { major, minor };
        let major = TxMajor::from_u8(major).ok_or_else(|| unknown.clone())?;
        let minor = TxMinor::from_u8(minor).ok_or(unknown)?;
        Self::new(major, minor)
    }

    pub fn major(&self) -> TxMajor {
        self.major
    }

    pub fn minor(&self) -> TxMinor {
        self.minor
    }

    pub fn recipient_policy(&self) -> RecipientPolicy {
        self.major.recipient_policy()
    }

    /// Human-readable `Major/Minor` label. Presentation only.
    pub fn label(&self) -> String {
        match self.major {
            TxMajor::Normal => self.major.to_string(),
            _ => format!("{}/{}", self.major, self.minor),
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl TryFrom<RawCategory> for Category {
    type Error = TransactionError;

    fn try_from(raw: RawCategory) -> Result<Self, Self::Error> {
        Category::new(raw.major, raw.minor)
    }
}

impl From<Category> for RawCategory {
    fn from(category: Category) -> Self {
        RawCategory {
            major: category.major,
            minor: category.minor,
        }
    }
}
