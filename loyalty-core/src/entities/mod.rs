pub mod order_number;
pub mod orders;
pub mod users;
pub mod withdrawals;

pub use order_number::OrderNumber;

use loyalty_sdk::objects::{AccrualStatus, OrderStatus as SdkOrderStatus};

/// Number of fractional digits kept for every monetary amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Order status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `loyalty_sdk::objects::OrderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE", type_name = "order_status")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// `INVALID` and `PROCESSED` orders never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::Invalid => write!(f, "INVALID"),
            OrderStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::New => SdkOrderStatus::New,
            OrderStatus::Processing => SdkOrderStatus::Processing,
            OrderStatus::Invalid => SdkOrderStatus::Invalid,
            OrderStatus::Processed => SdkOrderStatus::Processed,
        }
    }
}

/// `REGISTERED` means the accrual service knows the order but has not
/// started on it, which is still `NEW` from the ledger's point of view.
impl From<AccrualStatus> for OrderStatus {
    fn from(value: AccrualStatus) -> Self {
        match value {
            AccrualStatus::Registered => OrderStatus::New,
            AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}
