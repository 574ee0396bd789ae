pub mod routes;
pub mod store;

/// Hard cap on trusted contacts per owner.
pub const MAX_TRUSTED_CONTACTS: usize = 5;

/// Validate an international phone number (E.164: leading `+`, then
/// 7 to 15 digits, first digit nonzero).
pub fn is_valid_phone(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    if !(7..=15).contains(&digits.len()) {
        return false;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    !digits.starts_with('0')
}
