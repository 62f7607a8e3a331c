//! Login, logout, sessions and PIN management.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Role, User, UserSummary};
use crate::storage::Store;

use super::lockout::{is_account_locked, AttemptState, LockoutPolicy};
use super::pin::PinHasher;
use super::session::{Session, SessionStore};
use super::usernames::{default_pin, generate_username};
use super::validation::{validate_login, validate_pin_field, validate_username};

/// Where users with an unchanged initial PIN are sent after login.
pub const CHANGE_PIN_PATH: &str = "/change-mpin";

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// When the token stops working.
    pub expires_at: DateTime<Utc>,
    /// The logged-in account.
    pub user: UserSummary,
    /// The account still uses its initial PIN.
    pub pin_change_required: bool,
    /// Page the client should open next.
    pub redirect_to: String,
}

/// An authenticated request's identity.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The session the token belongs to.
    pub session: Session,
    /// The account, as currently stored.
    pub user: User,
}

impl AuthContext {
    /// Whether the caller is staff.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    /// Fail with [`Error::Forbidden`] unless the caller is staff.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] for residents.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

/// A new login account.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    /// Given name, used for the username.
    pub first_name: &'a str,
    /// Family name, used for the username.
    pub last_name: &'a str,
    /// Account role.
    pub role: Role,
    /// Initial PIN, already validated.
    pub pin: &'a str,
    /// Whether the PIN was chosen by the user rather than assigned.
    pub pin_changed: bool,
}

/// Authentication service.
#[derive(Debug)]
pub struct AuthService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    hasher: PinHasher,
    policy: LockoutPolicy,
    sessions: SessionStore,
}

impl AuthService {
    /// Create a service with explicit settings.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        hasher: PinHasher,
        policy: LockoutPolicy,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            hasher,
            policy,
            sessions: SessionStore::new(session_ttl),
        }
    }

    /// Create a service from the `[auth]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            store,
            clock,
            PinHasher::new(config.auth.pin_pepper.clone()),
            config.lockout_policy(),
            config.session_ttl(),
        )
    }

    /// The lockout thresholds in force.
    #[must_use]
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// First step of the login form: does this username exist?
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed usernames, or
    /// [`Error::UsernameNotFound`].
    pub fn check_username(&self, username: &str) -> Result<UserSummary> {
        let username = validate_username(username)?;
        match self.store.find_user_by_username(username)? {
            Some(user) => Ok(user.summary()),
            None => {
                debug!("Username check for unknown user {}", username);
                Err(Error::UsernameNotFound)
            }
        }
    }

    /// Verify credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input,
    /// [`Error::InvalidCredentials`] for an unknown user or wrong PIN, and
    /// [`Error::AccountLocked`] while the account is locked or when this
    /// attempt locked it.
    pub fn login(&self, username: &str, pin: &str) -> Result<LoginResponse> {
        let username = validate_login(username, pin)?;
        let Some(mut user) = self.store.find_user_by_username(&username)? else {
            warn!("Login attempt for unknown user {}", username);
            return Err(Error::InvalidCredentials);
        };

        let now = self.clock.now();
        let mut state = AttemptState::of(&user);
        if let Some(until) = state.locked_until.filter(|_| is_account_locked(&state, now)) {
            warn!("Login attempt for locked account {}", user.username);
            return Err(Error::AccountLocked { until });
        }

        if !self.hasher.verify(pin, &user.pin_hash) {
            let locked = self.policy.record_failure(&mut state, now);
            state.apply_to(&mut user);
            self.store.update_user(&user)?;
            return match state.locked_until.filter(|_| locked) {
                Some(until) => {
                    warn!(
                        "Locked account {} after {} failed attempts",
                        user.username, state.failed_attempts
                    );
                    Err(Error::AccountLocked { until })
                }
                None => {
                    warn!(
                        "Failed login for {} ({} attempts left)",
                        user.username,
                        self.policy.remaining_attempts(&state)
                    );
                    Err(Error::InvalidCredentials)
                }
            };
        }

        self.policy.record_success(&mut state);
        state.apply_to(&mut user);
        user.last_login_at = Some(now);
        self.store.update_user(&user)?;

        let session = self.sessions.create(user.id, user.role, now)?;
        info!("User {} logged in", user.username);

        let pin_change_required = !user.is_pin_changed;
        let redirect_to = if pin_change_required {
            CHANGE_PIN_PATH
        } else {
            user.role.home_path()
        };
        Ok(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user: user.summary(),
            pin_change_required,
            redirect_to: redirect_to.to_string(),
        })
    }

    /// End a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store is unavailable.
    pub fn logout(&self, token: &str) -> Result<()> {
        if self.sessions.revoke(token)? {
            debug!("Session revoked");
        }
        Ok(())
    }

    /// Resolve a bearer token to its session and account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExpired`] when the token is unknown, expired,
    /// or its account no longer exists.
    pub fn authenticate(&self, token: &str) -> Result<AuthContext> {
        let now = self.clock.now();
        let session = self
            .sessions
            .get(token, now)?
            .ok_or(Error::SessionExpired)?;
        let user = self
            .store
            .get_user(session.user_id)?
            .ok_or(Error::SessionExpired)?;
        Ok(AuthContext { session, user })
    }

    /// Replace the caller's PIN. Other sessions of the account are revoked.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the new PIN is malformed, the
    /// confirmation differs, the current PIN is wrong, or the new PIN equals
    /// the current one.
    pub fn change_pin(
        &self,
        ctx: &AuthContext,
        current_pin: &str,
        new_pin: &str,
        confirm_pin: &str,
    ) -> Result<()> {
        if current_pin.is_empty() {
            return Err(Error::validation("current_pin", "Current PIN is required"));
        }
        validate_pin_field("new_pin", new_pin)?;
        if new_pin != confirm_pin {
            return Err(Error::validation("confirm_pin", "PINs do not match"));
        }

        let mut user = self
            .store
            .get_user(ctx.user.id)?
            .ok_or(Error::SessionExpired)?;
        if !self.hasher.verify(current_pin, &user.pin_hash) {
            return Err(Error::validation("current_pin", "Current PIN is incorrect"));
        }
        if current_pin == new_pin {
            return Err(Error::validation(
                "new_pin",
                "New PIN must be different from your current PIN",
            ));
        }

        user.pin_hash = self.hasher.hash(new_pin);
        user.is_pin_changed = true;
        self.store.update_user(&user)?;
        let revoked = self
            .sessions
            .revoke_user(user.id, Some(&ctx.session.token))?;
        info!(
            "User {} changed their PIN ({} other sessions ended)",
            user.username, revoked
        );
        Ok(())
    }

    /// Reset an account to its default PIN (the linked resident's birth date
    /// as `MMDDYY`) and clear any lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown account, or
    /// [`Error::Conflict`] when no birth date is on file.
    pub fn reset_pin(&self, user_id: i64) -> Result<UserSummary> {
        let mut user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| Error::not_found("User", user_id))?;
        let birth_date = self
            .store
            .find_resident_by_user(user_id)?
            .and_then(|r| r.birth_date)
            .ok_or_else(|| {
                Error::conflict("Cannot reset PIN: no birth date on file for this account")
            })?;

        user.pin_hash = self.hasher.hash(&default_pin(birth_date));
        user.is_pin_changed = false;
        let mut state = AttemptState::of(&user);
        self.policy.record_success(&mut state);
        state.apply_to(&mut user);
        self.store.update_user(&user)?;
        self.sessions.revoke_user(user.id, None)?;

        info!("PIN reset for {}", user.username);
        Ok(user.summary())
    }

    /// Clear failed attempts and any lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown account.
    pub fn unlock(&self, user_id: i64) -> Result<UserSummary> {
        let mut user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| Error::not_found("User", user_id))?;
        let mut state = AttemptState::of(&user);
        self.policy.record_success(&mut state);
        state.apply_to(&mut user);
        self.store.update_user(&user)?;
        info!("Unlocked {}", user.username);
        Ok(user.summary())
    }

    /// Create a login account with a generated `first.last` username.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the names yield no usable username
    /// or the PIN is malformed.
    pub fn register(&self, account: &NewAccount<'_>) -> Result<User> {
        validate_pin_field("pin", account.pin)?;
        let existing = self.store.list_usernames()?;
        let username = generate_username(account.first_name, account.last_name, &existing);
        validate_username(&username).map_err(|_| {
            Error::validation(
                "first_name",
                "Name must contain letters to generate a username",
            )
        })?;

        let user = self.store.insert_user(User {
            id: 0,
            username,
            pin_hash: self.hasher.hash(account.pin),
            role: account.role,
            first_name: account.first_name.trim().to_string(),
            last_name: account.last_name.trim().to_string(),
            is_pin_changed: account.pin_changed,
            failed_attempts: 0,
            last_attempt: None,
            locked_until: None,
            created_at: self.clock.now(),
            last_login_at: None,
        })?;
        info!("Created {} account {}", user.role.as_str(), user.username);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Resident;
    use crate::storage::{contract, SqliteStore};
    use chrono::NaiveDate;

    struct Fixture {
        auth: AuthService,
        store: Arc<dyn Store>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let clock = ManualClock::new(Utc::now());
        let auth = AuthService::new(
            store.clone(),
            Arc::new(clock.clone()),
            PinHasher::new("test-pepper"),
            LockoutPolicy::default(),
            Duration::hours(24),
        );
        Fixture { auth, store, clock }
    }

    fn resident_account(f: &Fixture) -> User {
        let user = f
            .auth
            .register(&NewAccount {
                first_name: "Juan",
                last_name: "Dela Cruz",
                role: Role::Resident,
                pin: "031590",
                pin_changed: false,
            })
            .unwrap();
        let mut resident: Resident = contract::resident("Juan", "Dela Cruz");
        resident.user_id = Some(user.id);
        resident.birth_date = NaiveDate::from_ymd_opt(1990, 3, 15);
        f.store.insert_resident(resident).unwrap();
        user
    }

    #[test]
    fn test_register_generates_username() {
        let f = fixture();
        let a = resident_account(&f);
        let b = resident_account(&f);
        assert_eq!(a.username, "juan.delacruz");
        assert_eq!(b.username, "juan.delacruz2");
        assert_ne!(a.pin_hash, "031590");
    }

    #[test]
    fn test_register_requires_letters() {
        let f = fixture();
        let err = f
            .auth
            .register(&NewAccount {
                first_name: "123",
                last_name: "",
                role: Role::Admin,
                pin: "123456",
                pin_changed: true,
            })
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_check_username() {
        let f = fixture();
        resident_account(&f);
        let summary = f.auth.check_username("JUAN.DELACRUZ").unwrap();
        assert_eq!(summary.first_name, "Juan");
        assert!(matches!(
            f.auth.check_username("maria.santos"),
            Err(Error::UsernameNotFound)
        ));
        assert!(f.auth.check_username("a").unwrap_err().is_validation());
    }

    #[test]
    fn test_first_login_requires_pin_change() {
        let f = fixture();
        resident_account(&f);
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        assert!(login.pin_change_required);
        assert_eq!(login.redirect_to, CHANGE_PIN_PATH);
        assert_eq!(login.expires_at, f.clock.now() + Duration::hours(24));

        let ctx = f.auth.authenticate(&login.token).unwrap();
        assert_eq!(ctx.user.username, "juan.delacruz");
        assert!(ctx.user.last_login_at.is_some());
    }

    #[test]
    fn test_admin_redirect() {
        let f = fixture();
        f.auth
            .register(&NewAccount {
                first_name: "Admin",
                last_name: "Staff",
                role: Role::Admin,
                pin: "010180",
                pin_changed: true,
            })
            .unwrap();
        let login = f.auth.login("admin.staff", "010180").unwrap();
        assert!(!login.pin_change_required);
        assert_eq!(login.redirect_to, "/admin");
    }

    #[test]
    fn test_unknown_user_and_wrong_pin_look_the_same() {
        let f = fixture();
        resident_account(&f);
        let unknown = f.auth.login("nobody", "123456").unwrap_err();
        let wrong = f.auth.login("juan.delacruz", "000000").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_lockout_after_five_failures() {
        let f = fixture();
        let user = resident_account(&f);
        for _ in 0..4 {
            assert!(matches!(
                f.auth.login("juan.delacruz", "000000"),
                Err(Error::InvalidCredentials)
            ));
        }
        assert!(matches!(
            f.auth.login("juan.delacruz", "000000"),
            Err(Error::AccountLocked { .. })
        ));
        // Even the right PIN is refused while locked.
        assert!(matches!(
            f.auth.login("juan.delacruz", "031590"),
            Err(Error::AccountLocked { .. })
        ));

        f.clock.advance(Duration::minutes(15));
        assert!(f.auth.login("juan.delacruz", "031590").is_ok());
        let stored = f.store.get_user(user.id).unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert!(stored.locked_until.is_none());
    }

    #[test]
    fn test_failures_outside_window_do_not_accumulate() {
        let f = fixture();
        resident_account(&f);
        for _ in 0..4 {
            f.auth.login("juan.delacruz", "000000").unwrap_err();
        }
        f.clock.advance(Duration::minutes(16));
        assert!(matches!(
            f.auth.login("juan.delacruz", "000000"),
            Err(Error::InvalidCredentials)
        ));
    }

    #[test]
    fn test_logout_ends_session() {
        let f = fixture();
        resident_account(&f);
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        f.auth.logout(&login.token).unwrap();
        f.auth.logout(&login.token).unwrap();
        assert!(matches!(
            f.auth.authenticate(&login.token),
            Err(Error::SessionExpired)
        ));
    }

    #[test]
    fn test_session_expires() {
        let f = fixture();
        resident_account(&f);
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        f.clock.advance(Duration::hours(24));
        assert!(matches!(
            f.auth.authenticate(&login.token),
            Err(Error::SessionExpired)
        ));
    }

    #[test]
    fn test_change_pin_rules() {
        let f = fixture();
        resident_account(&f);
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        let ctx = f.auth.authenticate(&login.token).unwrap();

        let message = |current: &str, new: &str, confirm: &str| {
            f.auth
                .change_pin(&ctx, current, new, confirm)
                .unwrap_err()
                .to_string()
        };
        assert_eq!(message("031590", "12", "12"), "PIN must be exactly 6 digits");
        assert_eq!(message("031590", "123456", "654321"), "PINs do not match");
        assert_eq!(message("111111", "123456", "123456"), "Current PIN is incorrect");
        assert_eq!(
            message("031590", "031590", "031590"),
            "New PIN must be different from your current PIN"
        );
    }

    #[test]
    fn test_change_pin_revokes_other_sessions() {
        let f = fixture();
        resident_account(&f);
        let first = f.auth.login("juan.delacruz", "031590").unwrap();
        let second = f.auth.login("juan.delacruz", "031590").unwrap();
        let ctx = f.auth.authenticate(&first.token).unwrap();

        f.auth.change_pin(&ctx, "031590", "246810", "246810").unwrap();

        assert!(f.auth.authenticate(&first.token).is_ok());
        assert!(f.auth.authenticate(&second.token).is_err());
        let login = f.auth.login("juan.delacruz", "246810").unwrap();
        assert!(!login.pin_change_required);
        assert_eq!(login.redirect_to, "/resident");
    }

    #[test]
    fn test_reset_pin_restores_birth_date_pin() {
        let f = fixture();
        let user = resident_account(&f);
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        let ctx = f.auth.authenticate(&login.token).unwrap();
        f.auth.change_pin(&ctx, "031590", "246810", "246810").unwrap();

        f.auth.reset_pin(user.id).unwrap();
        assert!(f.auth.authenticate(&login.token).is_err());
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        assert!(login.pin_change_required);
    }

    #[test]
    fn test_reset_pin_errors() {
        let f = fixture();
        assert!(f.auth.reset_pin(99).unwrap_err().is_not_found());
        let admin = f
            .auth
            .register(&NewAccount {
                first_name: "Admin",
                last_name: "Staff",
                role: Role::Admin,
                pin: "010180",
                pin_changed: true,
            })
            .unwrap();
        assert!(matches!(f.auth.reset_pin(admin.id), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_unlock_clears_lock() {
        let f = fixture();
        let user = resident_account(&f);
        for _ in 0..5 {
            f.auth.login("juan.delacruz", "000000").unwrap_err();
        }
        f.auth.unlock(user.id).unwrap();
        assert!(f.auth.login("juan.delacruz", "031590").is_ok());
        assert!(f.auth.unlock(99).unwrap_err().is_not_found());
    }

    #[test]
    fn test_require_admin() {
        let f = fixture();
        resident_account(&f);
        let login = f.auth.login("juan.delacruz", "031590").unwrap();
        let ctx = f.auth.authenticate(&login.token).unwrap();
        assert!(!ctx.is_admin());
        assert!(matches!(ctx.require_admin(), Err(Error::Forbidden)));
    }
}
