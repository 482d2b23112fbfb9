//! Status enums for orders, payments and callers.
//!
//! [`OrderStatus`] owns the lifecycle rule: an order only moves forward along
//! `Processing -> Shipped -> Delivered`, and `Delivered` is terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
}

/// Reasons an order status change is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested status equals the current one.
    #[error("order is already {0}; choose a different status")]
    NoChange(OrderStatus),

    /// The requested status would move the order backwards.
    #[error("order cannot move from {from} back to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order has been delivered and can no longer change.
    #[error("order has already been delivered")]
    Terminal,
}

impl OrderStatus {
    /// Validate a move from `self` to `requested`.
    ///
    /// Checks run in a fixed order: a no-op request is reported as
    /// [`TransitionError::NoChange`] even for delivered orders.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] describing why the move is refused.
    pub fn check_transition(self, requested: Self) -> Result<(), TransitionError> {
        if requested == self {
            return Err(TransitionError::NoChange(self));
        }
        if self == Self::Shipped && requested == Self::Processing {
            return Err(TransitionError::InvalidTransition {
                from: self,
                to: requested,
            });
        }
        if self.is_terminal() {
            return Err(TransitionError::Terminal);
        }
        Ok(())
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Stable string form, used for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment settlement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery; settled when the order is delivered.
    #[serde(rename = "COD")]
    CashOnDelivery,
    /// Paid up front through the ZaloPay gateway.
    #[serde(rename = "ZaloPay")]
    ZaloPay,
}

impl PaymentMethod {
    /// Stable string form, used for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "COD",
            Self::ZaloPay => "ZaloPay",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::CashOnDelivery),
            "ZaloPay" => Ok(Self::ZaloPay),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Caller role as asserted by the authenticating proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    /// Store staff with access to order management and sales data.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 3] = [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(
            OrderStatus::Processing
                .check_transition(OrderStatus::Shipped)
                .is_ok()
        );
        assert!(
            OrderStatus::Processing
                .check_transition(OrderStatus::Delivered)
                .is_ok()
        );
        assert!(
            OrderStatus::Shipped
                .check_transition(OrderStatus::Delivered)
                .is_ok()
        );
    }

    #[test]
    fn test_same_status_is_no_change() {
        for status in ALL {
            assert_eq!(
                status.check_transition(status),
                Err(TransitionError::NoChange(status))
            );
        }
    }

    #[test]
    fn test_shipped_cannot_revert() {
        assert_eq!(
            OrderStatus::Shipped.check_transition(OrderStatus::Processing),
            Err(TransitionError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Processing,
            })
        );
    }

    #[test]
    fn test_delivered_is_terminal() {
        assert_eq!(
            OrderStatus::Delivered.check_transition(OrderStatus::Processing),
            Err(TransitionError::Terminal)
        );
        assert_eq!(
            OrderStatus::Delivered.check_transition(OrderStatus::Shipped),
            Err(TransitionError::Terminal)
        );
        assert!(OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_accepted_transitions_never_move_backwards() {
        let rank = |s: OrderStatus| ALL.iter().position(|x| *x == s);
        for from in ALL {
            for to in ALL {
                if from.check_transition(to).is_ok() {
                    assert!(rank(to) > rank(from), "{from} -> {to} moved backwards");
                }
            }
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("Cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_method_serde_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"COD\""
        );
        let method: PaymentMethod = serde_json::from_str("\"ZaloPay\"").unwrap();
        assert_eq!(method, PaymentMethod::ZaloPay);
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("admin".parse::<UserRole>(), Ok(UserRole::Admin));
        assert_eq!("user".parse::<UserRole>(), Ok(UserRole::User));
        assert!("root".parse::<UserRole>().is_err());
    }
}
