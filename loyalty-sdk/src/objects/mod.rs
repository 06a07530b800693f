pub mod accrual;
pub mod user;

pub use accrual::{AccrualResponse, AccrualStatus};
pub use user::{
    BalanceResponse, Credentials, OrderResponse, OrderStatus, WithdrawRequest,
    WithdrawalResponse,
};
