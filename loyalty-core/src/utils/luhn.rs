/// Parse `input` as a non-negative integer and run the Luhn checksum on it.
///
/// Returns the parsed value together with the verdict. Input that does not
/// parse is reported as `(0, false)`.
pub fn check(input: &str) -> (u64, bool) {
    match input.parse::<u64>() {
        Ok(number) => (number, is_valid(number)),
        Err(_) => (0, false),
    }
}

/// Luhn checksum over the decimal digits of `number`.
pub fn is_valid(number: u64) -> bool {
    checksum(number) % 10 == 0
}

fn checksum(mut number: u64) -> u64 {
    let mut sum = 0;
    let mut double = false;
    while number > 0 {
        let mut digit = number % 10;
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
        number /= 10;
    }
    sum
}
