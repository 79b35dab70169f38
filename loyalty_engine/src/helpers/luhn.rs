/// Validates the Luhn checksum of an order number.
///
/// Order numbers are numeric strings whose last digit is a check digit over the rest. Anything that is not
/// purely numeric, or is too short to carry a check digit, fails validation.
pub fn luhn_valid(number: &str) -> bool {
    if number.len() < 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let mut sum = 0u32;
    for (i, b) in number.bytes().rev().enumerate() {
        let mut digit = u32::from(b - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit = digit % 10 + digit / 10;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}
