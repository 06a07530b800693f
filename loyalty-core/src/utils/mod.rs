pub mod luhn;
pub mod password;
