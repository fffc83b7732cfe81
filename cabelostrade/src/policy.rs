//! Marketplace rules applied before any SQL runs.
//!
//! The listing edit window, featured placement priority, the transaction
//! lifecycle, rating aggregation, upload and pagination limits, and the
//! enumerations stored as text columns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;

pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a text-backed enum.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw.trim() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: raw.to_string(),
                    }),
                }
            }
        }
    };
}

/// True while `now` is no more than `window` past `created_at`.
pub fn can_edit(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(created_at) <= window
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FeaturedType {
    Premium,
    Standard,
    Highlight,
}

text_enum!(FeaturedType, "featured type", {
    Premium => "premium",
    Standard => "standard",
    Highlight => "highlight",
});

impl FeaturedType {
    pub const ALL: [FeaturedType; 3] = [
        FeaturedType::Premium,
        FeaturedType::Standard,
        FeaturedType::Highlight,
    ];

    pub fn priority(self) -> i64 {
        match self {
            FeaturedType::Premium => 3,
            FeaturedType::Standard => 2,
            FeaturedType::Highlight => 1,
        }
    }

    /// SQL expression mapping `column` to the same priorities as [`FeaturedType::priority`].
    pub fn priority_sql(column: &str) -> String {
        let arms = Self::ALL
            .iter()
            .map(|kind| format!("WHEN '{}' THEN {}", kind.as_str(), kind.priority()))
            .collect::<Vec<_>>()
            .join(" ");
        format!("CASE {column} {arms} ELSE 0 END")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

text_enum!(TransactionStatus, "transaction status", {
    Pending => "pending",
    Paid => "paid",
    Shipped => "shipped",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// Which side of a transaction is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Seller,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("transaction is already {0}")]
    Terminal(TransactionStatus),
    #[error("cannot move a transaction from {from} to {to}")]
    NotAllowed {
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error("only the {0} may perform this step")]
    WrongParty(&'static str),
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled
        )
    }

    /// Reviews open once the goods have arrived.
    pub fn allows_review(self) -> bool {
        matches!(
            self,
            TransactionStatus::Delivered | TransactionStatus::Completed
        )
    }

    /// Validates a participant-driven transition. Completion is reserved for
    /// the admin escrow release and is never reachable from here.
    pub fn transition(self, party: Party, next: TransactionStatus) -> Result<Self, TransitionError> {
        use TransactionStatus::*;

        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }

        let required = match (self, next) {
            (Pending, Paid) => Some(Party::Buyer),
            (Pending, Cancelled) => None,
            (Paid, Shipped) | (Paid, Cancelled) => Some(Party::Seller),
            (Shipped, Delivered) => Some(Party::Buyer),
            _ => return Err(TransitionError::NotAllowed { from: self, to: next }),
        };

        match required {
            Some(Party::Buyer) if party != Party::Buyer => Err(TransitionError::WrongParty("buyer")),
            Some(Party::Seller) if party != Party::Seller => {
                Err(TransitionError::WrongParty("seller"))
            }
            _ => Ok(next),
        }
    }

    /// Escrow can only be released on goods the buyer confirmed.
    pub fn release_escrow(self) -> Result<Self, TransitionError> {
        match self {
            TransactionStatus::Delivered => Ok(TransactionStatus::Completed),
            other if other.is_terminal() => Err(TransitionError::Terminal(other)),
            other => Err(TransitionError::NotAllowed {
                from: other,
                to: TransactionStatus::Completed,
            }),
        }
    }
}

/// Mean of `ratings` and their count; `(0.0, 0)` when there are none.
pub fn average_rating(ratings: &[i64]) -> (f64, i64) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = ratings.iter().sum();
    let count = ratings.len() as i64;
    (sum as f64 / count as f64, count)
}

pub fn valid_rating(rating: i64) -> bool {
    (1..=5).contains(&rating)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReviewKind {
    Transaction,
    Profile,
}

text_enum!(ReviewKind, "review type", {
    Transaction => "transaction",
    Profile => "profile",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AdminActionType {
    Block,
    Unblock,
    Warn,
    Review,
    Note,
}

text_enum!(AdminActionType, "action type", {
    Block => "block",
    Unblock => "unblock",
    Warn => "warn",
    Review => "review",
    Note => "note",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

text_enum!(TicketStatus, "ticket status", {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

text_enum!(TicketPriority, "ticket priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketCategory {
    Technical,
    Transaction,
    Account,
    Product,
    #[default]
    General,
}

text_enum!(TicketCategory, "ticket category", {
    Technical => "technical",
    Transaction => "transaction",
    Account => "account",
    Product => "product",
    General => "general",
});

/// `ORDER BY` clause for the support queue: open work first, most urgent first.
pub fn ticket_queue_order() -> &'static str {
    "CASE status WHEN 'open' THEN 1 WHEN 'in_progress' THEN 2 WHEN 'resolved' THEN 3 WHEN 'closed' THEN 4 ELSE 5 END, \
     CASE priority WHEN 'urgent' THEN 1 WHEN 'high' THEN 2 WHEN 'medium' THEN 3 WHEN 'low' THEN 4 ELSE 5 END, \
     created_at DESC"
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("file too large ({size} bytes); maximum allowed is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported file type: {0}; use JPG, PNG, WEBP or GIF")]
    UnsupportedType(String),
}

pub fn check_upload(content_type: &str, size: usize, max: usize) -> Result<(), UploadRejection> {
    if size > max {
        return Err(UploadRejection::TooLarge { size, max });
    }
    let normalized = content_type.trim().to_ascii_lowercase();
    if !ALLOWED_IMAGE_TYPES.contains(&normalized.as_str()) {
        return Err(UploadRejection::UnsupportedType(content_type.to_string()));
    }
    Ok(())
}

/// Turns 1-based `page` and `limit` query values into `(limit, offset)`.
pub fn clamp_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let page = page.unwrap_or(1).max(1);
    (limit, (page - 1).saturating_mul(limit))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    #[test]
    fn edit_window_is_inclusive() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let window = Duration::minutes(30);

        assert!(can_edit(created, created, window));
        assert!(can_edit(created, created + Duration::minutes(30), window));
        assert!(!can_edit(
            created,
            created + Duration::minutes(30) + Duration::seconds(1),
            window
        ));
    }

    #[test]
    fn featured_priority_orders_premium_first() {
        assert!(FeaturedType::Premium.priority() > FeaturedType::Standard.priority());
        assert!(FeaturedType::Standard.priority() > FeaturedType::Highlight.priority());
        assert_eq!(
            FeaturedType::priority_sql("fp.featured_type"),
            "CASE fp.featured_type WHEN 'premium' THEN 3 WHEN 'standard' THEN 2 WHEN 'highlight' THEN 1 ELSE 0 END"
        );
    }

    #[test]
    fn buyer_pays_and_confirms_delivery() {
        let paid = TransactionStatus::Pending
            .transition(Party::Buyer, TransactionStatus::Paid)
            .unwrap();
        let shipped = paid
            .transition(Party::Seller, TransactionStatus::Shipped)
            .unwrap();
        let delivered = shipped
            .transition(Party::Buyer, TransactionStatus::Delivered)
            .unwrap();
        assert_eq!(delivered.release_escrow(), Ok(TransactionStatus::Completed));
    }

    #[test]
    fn wrong_party_cannot_advance() {
        assert_eq!(
            TransactionStatus::Pending.transition(Party::Seller, TransactionStatus::Paid),
            Err(TransitionError::WrongParty("buyer"))
        );
        assert_eq!(
            TransactionStatus::Paid.transition(Party::Buyer, TransactionStatus::Shipped),
            Err(TransitionError::WrongParty("seller"))
        );
    }

    #[test]
    fn completion_is_reserved_for_escrow_release() {
        assert!(matches!(
            TransactionStatus::Delivered.transition(Party::Buyer, TransactionStatus::Completed),
            Err(TransitionError::NotAllowed { .. })
        ));
        assert!(TransactionStatus::Shipped.release_escrow().is_err());
        assert_eq!(
            TransactionStatus::Cancelled.release_escrow(),
            Err(TransitionError::Terminal(TransactionStatus::Cancelled))
        );
    }

    #[test]
    fn either_party_cancels_pending() {
        for party in [Party::Buyer, Party::Seller] {
            assert_eq!(
                TransactionStatus::Pending.transition(party, TransactionStatus::Cancelled),
                Ok(TransactionStatus::Cancelled)
            );
        }
    }

    #[test]
    fn average_rating_handles_empty() {
        assert_eq!(average_rating(&[]), (0.0, 0));
        assert_eq!(average_rating(&[5, 4, 3]), (4.0, 3));
    }

    #[test]
    fn text_enums_parse_their_own_output() {
        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), status);
        }
        assert!("escalated".parse::<TicketStatus>().is_err());
        assert!("ban".parse::<AdminActionType>().is_err());
    }

    #[test]
    fn upload_rejects_large_and_unknown_types() {
        assert!(check_upload("image/png", 10, 100).is_ok());
        assert!(check_upload("IMAGE/JPEG", 10, 100).is_ok());
        assert_eq!(
            check_upload("image/png", 101, 100),
            Err(UploadRejection::TooLarge { size: 101, max: 100 })
        );
        assert!(matches!(
            check_upload("application/pdf", 10, 100),
            Err(UploadRejection::UnsupportedType(_))
        ));
    }

    #[test]
    fn clamp_page_bounds_limit_and_offset() {
        assert_eq!(clamp_page(None, None), (50, 0));
        assert_eq!(clamp_page(Some(3), Some(10)), (10, 20));
        assert_eq!(clamp_page(Some(0), Some(0)), (1, 0));
        assert_eq!(clamp_page(Some(-4), Some(1000)), (100, 0));
    }
}
