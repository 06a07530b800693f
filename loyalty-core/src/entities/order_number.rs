use crate::utils::luhn;

/// A Luhn-valid, strictly positive order number that fits a `BIGINT` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct OrderNumber(i64);

impl OrderNumber {
    /// Validate a user-supplied order number. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let (number, valid) = luhn::check(raw.trim());
        if !valid || number == 0 {
            return None;
        }
        i64::try_from(number).ok().map(Self)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
