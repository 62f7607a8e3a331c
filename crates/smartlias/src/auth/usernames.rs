//! Username generation and default PINs for new resident accounts.

use chrono::{Datelike, NaiveDate};

/// Longest name fragment kept when building a username.
pub const NAME_PART_MAX_LEN: usize = 20;

/// Reduce a name to lowercase ASCII letters, at most 20 of them.
///
/// `"Dela Cruz"` becomes `"delacruz"`, `"María"` becomes `"mara"`.
#[must_use]
pub fn clean_name_for_username(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_lowercase)
        .take(NAME_PART_MAX_LEN)
        .collect()
}

/// Build a `first.last` username not already in `existing`.
///
/// Collisions are resolved by appending 2, 3, ... to the base. Comparison is
/// case-insensitive.
#[must_use]
pub fn generate_username<S: AsRef<str>>(first_name: &str, last_name: &str, existing: &[S]) -> String {
    let base = format!(
        "{}.{}",
        clean_name_for_username(first_name),
        clean_name_for_username(last_name)
    );
    let taken = |candidate: &str| {
        existing
            .iter()
            .any(|name| name.as_ref().eq_ignore_ascii_case(candidate))
    };
    if !taken(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

/// The initial PIN for a resident: birth date as `MMDDYY`.
#[must_use]
pub fn default_pin(birth_date: NaiveDate) -> String {
    format!(
        "{:02}{:02}{:02}",
        birth_date.month(),
        birth_date.day(),
        birth_date.year().rem_euclid(100)
    )
}
