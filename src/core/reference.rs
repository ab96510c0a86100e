//! Booking reference codes.
//!
//! A reference code is `BK` followed by ten uppercase hex digits. Customers put it
//! in the bank transfer description, and the webhook reconciler looks for it in
//! whatever text the bank forwards back.

use uuid::Uuid;

const PREFIX: &str = "BK";
const CODE_DIGITS: usize = 10;

/// Generates a fresh reference code.
#[must_use]
pub fn generate_reference_code() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("{PREFIX}{}", &hex[..CODE_DIGITS])
}

/// Finds the first reference code embedded in `text`.
///
/// Banks upper-case, trim and concatenate the description freely, so matching is
/// case-insensitive and ignores whatever surrounds the code.
#[must_use]
pub fn extract_reference_code(text: &str) -> Option<String> {
    let upper = text.to_ascii_uppercase();
    let mut search_from = 0;

    while let Some(offset) = upper[search_from..].find(PREFIX) {
        let begin = search_from + offset;
        let digits_start = begin + PREFIX.len();
        if let Some(digits) = upper.get(digits_start..digits_start + CODE_DIGITS) {
            if digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Some(format!("{PREFIX}{digits}"));
            }
        }
        search_from = begin + 1;
    }

    None
}
