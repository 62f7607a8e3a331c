//! Resident records management.
//!
//! Listing rules (active only, search, name order, paging) are applied here,
//! once, on top of whatever the store returns.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{default_pin, AuthService, NewAccount};
use crate::clock::{age_on, Clock};
use crate::error::{Error, Result};
use crate::model::{Gender, Resident, Role, SpecialCategory, Suffix};
use crate::storage::Store;

/// Page size when none is requested.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Residents created this recently count as new in [`ResidentStats`].
pub const RECENT_DAYS: i64 = 30;

/// Parse a record id from a path segment. Zero-padded ids are accepted.
///
/// # Errors
///
/// Returns a validation error for anything but a positive integer.
pub fn parse_id(entity: &'static str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| Error::validation("id", format!("Invalid {entity} ID")))
}

/// A value clients send either as a number or as text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    /// `3`
    Number(i64),
    /// `"3"` or `"male"`
    Text(String),
}

impl TextOrNumber {
    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

/// Resident fields as submitted by the admin form.
///
/// Accepts both `snake_case` and the web client's `camelCase` names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResidentInput {
    /// Family name, required.
    #[serde(alias = "lastName")]
    pub last_name: String,
    /// Given name, required.
    #[serde(alias = "firstName")]
    pub first_name: String,
    /// Middle name.
    #[serde(alias = "middleName")]
    pub middle_name: Option<String>,
    /// Suffix code (1-6) or label (`Jr.`).
    pub suffix: Option<TextOrNumber>,
    /// `YYYY-MM-DD`.
    #[serde(alias = "birthDate")]
    pub birth_date: Option<String>,
    /// `male`/`female` or the numeric code.
    pub gender: Option<TextOrNumber>,
    /// Civil status, stored lowercase.
    #[serde(alias = "civilStatus")]
    pub civil_status: Option<String>,
    /// Mobile number as entered.
    #[serde(alias = "contactNumber", alias = "mobileNumber")]
    pub contact_number: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Street address, required.
    pub address: String,
    /// Purok number, as a number or numeric text.
    pub purok: Option<TextOrNumber>,
    /// Religion.
    pub religion: Option<String>,
    /// Occupation.
    pub occupation: Option<String>,
    /// Category tags such as `PWD`.
    #[serde(alias = "specialCategories")]
    pub special_categories: Vec<String>,
}

/// Validated, normalised resident fields.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResidentFields {
    last_name: String,
    first_name: String,
    middle_name: Option<String>,
    suffix: Option<Suffix>,
    birth_date: Option<NaiveDate>,
    gender: Option<Gender>,
    civil_status: Option<String>,
    contact_number: Option<String>,
    email: Option<String>,
    address: String,
    purok: Option<u8>,
    religion: Option<String>,
    occupation: Option<String>,
    special_categories: Vec<SpecialCategory>,
}

impl ResidentFields {
    fn apply_to(self, resident: &mut Resident) {
        resident.last_name = self.last_name;
        resident.first_name = self.first_name;
        resident.middle_name = self.middle_name;
        resident.suffix = self.suffix;
        resident.birth_date = self.birth_date;
        resident.gender = self.gender;
        resident.civil_status = self.civil_status;
        resident.contact_number = self.contact_number;
        resident.email = self.email;
        resident.address = self.address;
        resident.purok = self.purok;
        resident.religion = self.religion;
        resident.occupation = self.occupation;
        resident.special_categories = self.special_categories;
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex pattern"))
}

/// Trim; empty becomes `None`.
fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(field: &'static str, value: &str, label: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::validation(field, format!("{label} is required")))
    } else {
        Ok(value.to_string())
    }
}

fn parse_suffix(value: &TextOrNumber) -> Result<Option<Suffix>> {
    let text = value.as_text();
    if text.is_empty() {
        return Ok(None);
    }
    let by_code = text.parse::<u8>().ok().and_then(|n| Suffix::try_from(n).ok());
    let by_label = || {
        [Suffix::Jr, Suffix::Sr, Suffix::II, Suffix::III, Suffix::IV, Suffix::V]
            .into_iter()
            .find(|s| s.label().trim_end_matches('.').eq_ignore_ascii_case(text.trim_end_matches('.')))
    };
    by_code
        .or_else(by_label)
        .map(Some)
        .ok_or_else(|| Error::validation("suffix", "Invalid suffix"))
}

impl ResidentInput {
    fn validate(&self, today: NaiveDate) -> Result<ResidentFields> {
        let last_name = required("last_name", &self.last_name, "Last name")?;
        let first_name = required("first_name", &self.first_name, "First name")?;
        let address = required("address", &self.address, "Address")?;

        let birth_date = match optional(self.birth_date.as_ref()) {
            None => None,
            Some(raw) => {
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    Error::validation("birth_date", "Birth date must be a valid date (YYYY-MM-DD)")
                })?;
                if date > today {
                    return Err(Error::validation(
                        "birth_date",
                        "Birth date cannot be in the future",
                    ));
                }
                Some(date)
            }
        };

        let gender = match self.gender.as_ref().map(TextOrNumber::as_text) {
            None => None,
            Some(text) if text.is_empty() => None,
            Some(text) => Some(
                text.parse::<Gender>()
                    .map_err(|_| Error::validation("gender", "Gender must be male or female"))?,
            ),
        };

        let suffix = match &self.suffix {
            None => None,
            Some(value) => parse_suffix(value)?,
        };

        let purok = match self.purok.as_ref().map(TextOrNumber::as_text) {
            None => None,
            Some(text) if text.is_empty() => None,
            Some(text) => Some(
                text.parse::<u8>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::validation("purok", "Purok must be a positive number"))?,
            ),
        };

        let email = optional(self.email.as_ref());
        if let Some(email) = &email {
            if !email_pattern().is_match(email) {
                return Err(Error::validation("email", "Email address is invalid"));
            }
        }

        let mut special_categories = Vec::new();
        for raw in &self.special_categories {
            let category = raw.parse::<SpecialCategory>().map_err(|_| {
                Error::validation(
                    "special_categories",
                    format!("Unknown special category: {raw}"),
                )
            })?;
            if !special_categories.contains(&category) {
                special_categories.push(category);
            }
        }

        Ok(ResidentFields {
            last_name,
            first_name,
            middle_name: optional(self.middle_name.as_ref()),
            suffix,
            birth_date,
            gender,
            civil_status: optional(self.civil_status.as_ref()).map(|s| s.to_lowercase()),
            contact_number: optional(self.contact_number.as_ref()),
            email,
            address,
            purok,
            religion: optional(self.religion.as_ref()),
            occupation: optional(self.occupation.as_ref()),
            special_categories,
        })
    }
}

/// Search and paging for the resident list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentQuery {
    search: Option<String>,
    page: usize,
    limit: usize,
}

impl Default for ResidentQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ResidentQuery {
    /// Build a query; missing values take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a validation error for page 0 or a limit outside `1..=100`.
    pub fn new(search: Option<&str>, page: Option<usize>, limit: Option<usize>) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(Error::validation("page", "Page must be at least 1"));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(Error::validation(
                "limit",
                format!("Limit must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        Ok(Self {
            search,
            page,
            limit,
        })
    }

    fn matches(&self, resident: &Resident) -> bool {
        let Some(needle) = &self.search else {
            return true;
        };
        [&resident.first_name, &resident.last_name, &resident.address]
            .iter()
            .any(|field| field.to_lowercase().contains(needle.as_str()))
    }

    /// Filter, sort and cut one page. Returns the page and the filtered total.
    #[must_use]
    pub fn apply(&self, residents: Vec<Resident>) -> (Vec<Resident>, usize) {
        let mut matching: Vec<Resident> = residents
            .into_iter()
            .filter(|r| r.is_active && self.matches(r))
            .collect();
        matching.sort_by(|a, b| {
            a.last_name
                .to_lowercase()
                .cmp(&b.last_name.to_lowercase())
                .then_with(|| a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()))
                .then_with(|| a.id.cmp(&b.id))
        });
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip((self.page - 1).saturating_mul(self.limit))
            .take(self.limit)
            .collect();
        (page, total)
    }
}

/// Login details shown on a resident's profile. Never includes a PIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    /// Login name.
    pub username: String,
    /// Whether the initial PIN has been replaced.
    pub is_pin_changed: bool,
    /// When the account was created.
    pub account_created_at: DateTime<Utc>,
}

/// A resident as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidentView {
    /// The stored record.
    #[serde(flatten)]
    pub resident: Resident,
    /// Zero-padded id.
    pub display_id: String,
    /// Age today in Manila, if the birth date is known.
    pub age: Option<u32>,
    /// Linked account, on single-record lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountInfo>,
}

/// One page of residents.
#[derive(Debug, Clone, Serialize)]
pub struct ResidentPage {
    /// Residents on this page.
    pub residents: Vec<ResidentView>,
    /// Matching residents across all pages.
    pub total: usize,
    /// Page number, from 1.
    pub page: usize,
    /// Page size.
    pub limit: usize,
}

/// Credentials for a newly created account, shown once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitialCredentials {
    /// Generated login name.
    pub username: String,
    /// Birth-date PIN the resident must change on first login.
    pub initial_pin: String,
}

/// Result of creating a resident.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedResident {
    /// The new record.
    pub resident: ResidentView,
    /// Present when an account was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<InitialCredentials>,
}

/// Resident counts for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResidentStats {
    /// Active residents.
    pub total: usize,
    /// Active residents added in the last 30 days.
    pub recent_count: usize,
}

/// Resident management service.
#[derive(Debug)]
pub struct ResidentService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    auth: Arc<AuthService>,
}

impl ResidentService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, auth: Arc<AuthService>) -> Self {
        Self { store, clock, auth }
    }

    fn view(&self, resident: Resident) -> ResidentView {
        let today = self.clock.today();
        ResidentView {
            display_id: resident.display_id(),
            age: resident.birth_date.and_then(|b| age_on(b, today)),
            account: None,
            resident,
        }
    }

    fn fetch(&self, id: i64) -> Result<Resident> {
        self.store
            .get_resident(id)?
            .ok_or_else(|| Error::not_found("Resident", id))
    }

    /// List active residents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list(&self, query: &ResidentQuery) -> Result<ResidentPage> {
        let (residents, total) = query.apply(self.store.list_residents()?);
        Ok(ResidentPage {
            residents: residents.into_iter().map(|r| self.view(r)).collect(),
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// Fetch one resident, active or not, with account details.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn get(&self, id: i64) -> Result<ResidentView> {
        let resident = self.fetch(id)?;
        let account = match resident.user_id {
            Some(user_id) => self.store.get_user(user_id)?.map(|user| AccountInfo {
                username: user.username,
                is_pin_changed: user.is_pin_changed,
                account_created_at: user.created_at,
            }),
            None => None,
        };
        let mut view = self.view(resident);
        view.account = account;
        Ok(view)
    }

    /// The resident record linked to an account, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn for_user(&self, user_id: i64) -> Result<Option<Resident>> {
        self.store.find_resident_by_user(user_id)
    }

    /// Add a resident, optionally with a login account.
    ///
    /// The account gets a generated `first.last` username and the birth
    /// date as its PIN.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, including a missing birth
    /// date when an account is requested.
    pub fn create(&self, input: &ResidentInput, create_account: bool) -> Result<CreatedResident> {
        let now = self.clock.now();
        let fields = input.validate(self.clock.today())?;

        let credentials = if create_account {
            let birth_date = fields.birth_date.ok_or_else(|| {
                Error::validation("birth_date", "Birth date is required to create an account")
            })?;
            let initial_pin = default_pin(birth_date);
            let user = self.auth.register(&NewAccount {
                first_name: &fields.first_name,
                last_name: &fields.last_name,
                role: Role::Resident,
                pin: &initial_pin,
                pin_changed: false,
            })?;
            Some((user.id, InitialCredentials {
                username: user.username,
                initial_pin,
            }))
        } else {
            None
        };

        let mut resident = Resident {
            id: 0,
            user_id: credentials.as_ref().map(|(id, _)| *id),
            last_name: String::new(),
            first_name: String::new(),
            middle_name: None,
            suffix: None,
            birth_date: None,
            gender: None,
            civil_status: None,
            contact_number: None,
            email: None,
            address: String::new(),
            purok: None,
            religion: None,
            occupation: None,
            special_categories: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: None,
        };
        fields.apply_to(&mut resident);
        let resident = match self.store.insert_resident(resident) {
            Ok(resident) => resident,
            Err(e) => {
                // Release the username the new account took.
                if let Some((user_id, _)) = &credentials {
                    if let Err(cleanup) = self.store.delete_user(*user_id) {
                        warn!("Failed to remove orphaned account {user_id}: {cleanup}");
                    }
                }
                return Err(e);
            }
        };
        info!("Created resident {}", resident.display_id());

        Ok(CreatedResident {
            resident: self.view(resident),
            credentials: credentials.map(|(_, c)| c),
        })
    }

    /// Replace a resident's editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id or a validation error
    /// for bad input.
    pub fn update(&self, id: i64, input: &ResidentInput) -> Result<ResidentView> {
        let mut resident = self.fetch(id)?;
        let fields = input.validate(self.clock.today())?;
        fields.apply_to(&mut resident);
        resident.updated_at = Some(self.clock.now());
        self.store.update_resident(&resident)?;

        if let Some(mut user) = resident
            .user_id
            .map(|user_id| self.store.get_user(user_id))
            .transpose()?
            .flatten()
        {
            if user.first_name != resident.first_name || user.last_name != resident.last_name {
                user.first_name.clone_from(&resident.first_name);
                user.last_name.clone_from(&resident.last_name);
                self.store.update_user(&user)?;
            }
        }

        info!("Updated resident {}", resident.display_id());
        Ok(self.view(resident))
    }

    fn set_active(&self, id: i64, active: bool) -> Result<Resident> {
        let mut resident = self.fetch(id)?;
        if resident.is_active != active {
            resident.is_active = active;
            resident.updated_at = Some(self.clock.now());
            self.store.update_resident(&resident)?;
        }
        Ok(resident)
    }

    /// Soft-delete a resident.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn deactivate(&self, id: i64) -> Result<()> {
        let resident = self.set_active(id, false)?;
        info!("Deactivated resident {}", resident.display_id());
        Ok(())
    }

    /// Restore a soft-deleted resident.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn activate(&self, id: i64) -> Result<ResidentView> {
        let resident = self.set_active(id, true)?;
        info!("Activated resident {}", resident.display_id());
        Ok(self.view(resident))
    }

    /// Dashboard counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn stats(&self) -> Result<ResidentStats> {
        let since = self.clock.now() - Duration::days(RECENT_DAYS);
        let active: Vec<Resident> = self
            .store
            .list_residents()?
            .into_iter()
            .filter(|r| r.is_active)
            .collect();
        Ok(ResidentStats {
            total: active.len(),
            recent_count: active.iter().filter(|r| r.created_at >= since).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LockoutPolicy, PinHasher};
    use crate::clock::ManualClock;
    use crate::storage::{contract, JsonStore, SqliteStore};
    use chrono::TimeZone;

    fn service_with(store: Arc<dyn Store>) -> (ResidentService, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let auth = Arc::new(AuthService::new(
            store.clone(),
            clock_arc.clone(),
            PinHasher::new("test-pepper"),
            LockoutPolicy::default(),
            Duration::hours(24),
        ));
        (ResidentService::new(store, clock_arc, auth), clock)
    }

    fn service() -> (ResidentService, ManualClock) {
        service_with(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    fn input(first: &str, last: &str) -> ResidentInput {
        ResidentInput {
            first_name: first.to_string(),
            last_name: last.to_string(),
            address: format!("{first} Street"),
            birth_date: Some("1990-03-15".to_string()),
            ..ResidentInput::default()
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("Resident", "000042").unwrap(), 42);
        assert_eq!(
            parse_id("Resident", "abc").unwrap_err().to_string(),
            "Invalid Resident ID"
        );
        assert!(parse_id("Resident", "0").is_err());
        assert!(parse_id("Resident", "-3").is_err());
    }

    #[test]
    fn test_input_accepts_camel_case_and_mixed_types() {
        let json = r#"{
            "firstName": " Maria ", "lastName": "Santos", "middleName": "",
            "birthDate": "1985-12-08", "gender": "Female", "purok": "3",
            "address": "Purok 3", "suffix": 2, "specialCategories": ["PWD", "pwd"],
            "civilStatus": "Married", "email": "maria@example.com"
        }"#;
        let parsed: ResidentInput = serde_json::from_str(json).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let fields = parsed.validate(today).unwrap();
        assert_eq!(fields.first_name, "Maria");
        assert_eq!(fields.middle_name, None);
        assert_eq!(fields.gender, Some(Gender::Female));
        assert_eq!(fields.purok, Some(3));
        assert_eq!(fields.suffix, Some(Suffix::Sr));
        assert_eq!(fields.special_categories, vec![SpecialCategory::Pwd]);
        assert_eq!(fields.civil_status.as_deref(), Some("married"));
    }

    #[test]
    fn test_input_validation_messages() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let message = |input: ResidentInput| input.validate(today).unwrap_err().to_string();

        assert_eq!(message(ResidentInput::default()), "Last name is required");
        let mut bad = input("Juan", "Cruz");
        bad.birth_date = Some("15/03/1990".to_string());
        assert_eq!(message(bad), "Birth date must be a valid date (YYYY-MM-DD)");
        let mut bad = input("Juan", "Cruz");
        bad.birth_date = Some("2030-01-01".to_string());
        assert_eq!(message(bad), "Birth date cannot be in the future");
        let mut bad = input("Juan", "Cruz");
        bad.gender = Some(TextOrNumber::Number(3));
        assert_eq!(message(bad), "Gender must be male or female");
        let mut bad = input("Juan", "Cruz");
        bad.purok = Some(TextOrNumber::Text("zero".to_string()));
        assert_eq!(message(bad), "Purok must be a positive number");
        let mut bad = input("Juan", "Cruz");
        bad.email = Some("not-an-email".to_string());
        assert_eq!(message(bad), "Email address is invalid");
        let mut bad = input("Juan", "Cruz");
        bad.special_categories = vec!["VETERAN".to_string()];
        assert_eq!(message(bad), "Unknown special category: VETERAN");
    }

    #[test]
    fn test_suffix_accepts_labels() {
        assert_eq!(
            parse_suffix(&TextOrNumber::Text("jr".to_string())).unwrap(),
            Some(Suffix::Jr)
        );
        assert_eq!(
            parse_suffix(&TextOrNumber::Text("III".to_string())).unwrap(),
            Some(Suffix::III)
        );
        assert_eq!(parse_suffix(&TextOrNumber::Text(String::new())).unwrap(), None);
        assert!(parse_suffix(&TextOrNumber::Number(9)).is_err());
    }

    #[test]
    fn test_query_defaults_and_bounds() {
        let query = ResidentQuery::new(None, None, None).unwrap();
        assert_eq!(query, ResidentQuery::default());
        assert!(ResidentQuery::new(None, Some(0), None).is_err());
        assert!(ResidentQuery::new(None, None, Some(0)).is_err());
        assert!(ResidentQuery::new(None, None, Some(101)).is_err());
        assert!(ResidentQuery::new(None, None, Some(100)).is_ok());
    }

    #[test]
    fn test_query_filters_sorts_and_counts() {
        let mut residents = vec![
            contract::resident("Maria", "Santos"),
            contract::resident("Ana", "Reyes"),
            contract::resident("Jose", "santos"),
            contract::resident("Pedro", "Santos"),
        ];
        for (i, r) in residents.iter_mut().enumerate() {
            r.id = i64::try_from(i).unwrap() + 1;
        }
        residents[3].is_active = false;

        let query = ResidentQuery::new(Some("  SANTOS "), Some(1), Some(1)).unwrap();
        let (page, total) = query.apply(residents.clone());
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].first_name, "Jose");

        let query = ResidentQuery::new(Some("santos"), Some(2), Some(1)).unwrap();
        let (page, _) = query.apply(residents.clone());
        assert_eq!(page[0].first_name, "Maria");

        let query = ResidentQuery::new(Some("rizal"), None, None).unwrap();
        assert_eq!(query.apply(residents).1, 3);
    }

    #[test]
    fn test_create_with_account_returns_credentials_once() {
        let (service, _) = service();
        let created = service.create(&input("Juan", "Dela Cruz"), true).unwrap();
        let credentials = created.credentials.unwrap();
        assert_eq!(credentials.username, "juan.delacruz");
        assert_eq!(credentials.initial_pin, "031590");
        assert_eq!(created.resident.age, Some(35));

        let fetched = service.get(created.resident.resident.id).unwrap();
        let account = fetched.account.unwrap();
        assert_eq!(account.username, "juan.delacruz");
        assert!(!account.is_pin_changed);
        let json = serde_json::to_string(&service.get(fetched.resident.id).unwrap()).unwrap();
        assert!(!json.contains("031590"));
        assert!(!json.contains("pin_hash"));
    }

    #[test]
    fn test_create_account_needs_birth_date() {
        let (service, _) = service();
        let mut no_birth = input("Ana", "Reyes");
        no_birth.birth_date = None;
        let err = service.create(&no_birth, true).unwrap_err();
        assert_eq!(err.to_string(), "Birth date is required to create an account");
        assert!(service.create(&no_birth, false).unwrap().credentials.is_none());
    }

    #[test]
    fn test_failed_resident_insert_releases_username() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(JsonStore::open(dir.path()).unwrap());
        let (service, _) = service_with(store.clone());

        // A directory in place of the residents file makes its save fail.
        let blocker = dir.path().join("residents.json");
        std::fs::create_dir(&blocker).unwrap();
        assert!(service.create(&input("Juan", "Dela Cruz"), true).is_err());
        assert!(store.list_usernames().unwrap().is_empty());
        assert!(store.find_user_by_username("juan.delacruz").unwrap().is_none());

        std::fs::remove_dir(&blocker).unwrap();
        let created = service.create(&input("Juan", "Dela Cruz"), true).unwrap();
        assert_eq!(created.credentials.unwrap().username, "juan.delacruz");
    }

    #[test]
    fn test_update_replaces_fields_and_syncs_account_name() {
        let (service, clock) = service();
        let created = service.create(&input("Juan", "Cruz"), true).unwrap();
        let id = created.resident.resident.id;
        clock.advance(Duration::days(1));

        let mut edit = input("Juanito", "Cruz");
        edit.purok = Some(TextOrNumber::Number(4));
        let updated = service.update(id, &edit).unwrap();
        assert_eq!(updated.resident.first_name, "Juanito");
        assert_eq!(updated.resident.purok, Some(4));
        assert_eq!(updated.resident.updated_at, Some(clock.now()));
        assert!(updated.resident.user_id.is_some());

        let user = service
            .store
            .get_user(updated.resident.user_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(user.first_name, "Juanito");

        assert!(service.update(999, &edit).unwrap_err().is_not_found());
    }

    #[test]
    fn test_deactivate_hides_from_list_but_not_get() {
        let (service, _) = service();
        let id = service.create(&input("Ana", "Reyes"), false).unwrap().resident.resident.id;
        service.deactivate(id).unwrap();

        let page = service.list(&ResidentQuery::default()).unwrap();
        assert_eq!(page.total, 0);
        assert!(!service.get(id).unwrap().resident.is_active);

        service.activate(id).unwrap();
        assert_eq!(service.list(&ResidentQuery::default()).unwrap().total, 1);
        assert!(service.deactivate(999).unwrap_err().is_not_found());
        assert!(service.activate(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_stats_counts_recent_active() {
        let (service, clock) = service();
        service.create(&input("Old", "Timer"), false).unwrap();
        clock.advance(Duration::days(40));
        service.create(&input("New", "Comer"), false).unwrap();
        let gone = service.create(&input("Gone", "Away"), false).unwrap();
        service.deactivate(gone.resident.resident.id).unwrap();

        let stats = service.stats().unwrap();
        assert_eq!(stats, ResidentStats { total: 2, recent_count: 1 });
    }

    #[test]
    fn test_backends_list_identically() {
        let dir = tempfile::tempdir().unwrap();
        let stores: Vec<Arc<dyn Store>> = vec![
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(JsonStore::open(dir.path()).unwrap()),
        ];
        let mut pages = Vec::new();
        for store in stores {
            let (service, _) = service_with(store);
            for (first, last) in [("Maria", "Santos"), ("ana", "reyes"), ("Jose", "Garcia")] {
                service.create(&input(first, last), false).unwrap();
            }
            let query = ResidentQuery::new(Some("a"), Some(1), Some(2)).unwrap();
            let page = service.list(&query).unwrap();
            let names: Vec<String> = page
                .residents
                .iter()
                .map(|v| v.resident.last_name.clone())
                .collect();
            pages.push((page.total, names));
        }
        assert_eq!(pages[0], pages[1]);
        assert_eq!(pages[0].0, 3);
        assert_eq!(pages[0].1, vec!["Garcia".to_string(), "reyes".to_string()]);
    }
}
