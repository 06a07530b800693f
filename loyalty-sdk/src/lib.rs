//! Wire types shared between the loyalty ledger server, its clients and
//! the accrual service adapter.

pub mod objects;
pub mod signature;
