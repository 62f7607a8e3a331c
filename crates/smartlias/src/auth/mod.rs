//! PIN-based authentication.
//!
//! Residents sign in with a username and a 6-digit PIN (MPIN). New resident
//! accounts start with their birth date as the PIN and are asked to change
//! it on first login. Repeated failures lock the account for a while.

mod lockout;
mod pin;
mod service;
mod session;
mod usernames;
mod validation;

pub use lockout::{is_account_locked, AttemptState, LockoutPolicy};
pub use pin::PinHasher;
pub use service::{AuthContext, AuthService, LoginResponse, NewAccount, CHANGE_PIN_PATH};
pub use session::{Session, SessionStore};
pub use usernames::{clean_name_for_username, default_pin, generate_username};
pub use validation::{
    validate_login, validate_pin, validate_username, PIN_LENGTH, USERNAME_MAX_LEN,
    USERNAME_MIN_LEN,
};
