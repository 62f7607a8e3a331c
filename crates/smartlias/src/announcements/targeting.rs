//! SMS audience resolution.
//!
//! Maps target tags to the set of active residents with a usable mobile
//! number. Numbers are normalised to `+639XXXXXXXXX` and each number
//! receives at most one message.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::clock::age_on;
use crate::model::{Resident, SpecialCategory, TargetGroup};

/// Residents this old count as senior citizens even without the tag.
pub const SENIOR_AGE: u32 = 60;

/// A resolved SMS recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Resident the number belongs to.
    pub resident_id: i64,
    /// Normalised `+639XXXXXXXXX` number.
    pub mobile: String,
}

/// Normalise a Philippine mobile number to `+639XXXXXXXXX`.
///
/// Accepts `09XXXXXXXXX`, `639XXXXXXXXX`, `+639XXXXXXXXX` and
/// `9XXXXXXXXX`, with spaces, dashes, dots or parentheses in between.
/// Returns `None` for anything else, landlines included.
#[must_use]
pub fn normalize_mobile(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let plus = trimmed.starts_with('+');
    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars().skip(usize::from(plus)) {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    let subscriber = match (plus, digits.len()) {
        (_, 12) => digits.strip_prefix("63")?,
        (false, 11) => digits.strip_prefix('0')?,
        (false, 10) => digits.as_str(),
        _ => return None,
    };
    if !subscriber.starts_with('9') {
        return None;
    }
    Some(format!("+63{subscriber}"))
}

/// Whether `resident` falls in `group` on `today`.
#[must_use]
pub fn matches_group(resident: &Resident, group: TargetGroup, today: NaiveDate) -> bool {
    match group {
        TargetGroup::All => true,
        TargetGroup::SpecialCategory(SpecialCategory::SeniorCitizen) => {
            resident.has_category(SpecialCategory::SeniorCitizen)
                || resident
                    .birth_date
                    .and_then(|birth| age_on(birth, today))
                    .is_some_and(|age| age >= SENIOR_AGE)
        }
        TargetGroup::SpecialCategory(category) => resident.has_category(category),
        TargetGroup::Purok(n) => resident.purok == Some(n),
    }
}

/// Active residents in any of `groups` with a valid mobile number.
///
/// The result follows the input order and contains each number once.
#[must_use]
pub fn resolve_recipients(
    residents: &[Resident],
    groups: &[TargetGroup],
    today: NaiveDate,
) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    residents
        .iter()
        .filter(|r| r.is_active)
        .filter(|r| groups.iter().any(|g| matches_group(r, *g, today)))
        .filter_map(|r| {
            let mobile = normalize_mobile(r.contact_number.as_deref()?)?;
            Some(Recipient {
                resident_id: r.id,
                mobile,
            })
        })
        .filter(|recipient| seen.insert(recipient.mobile.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn resident(id: i64, contact: Option<&str>) -> Resident {
        let mut r = contract::resident("Maria", "Santos");
        r.id = id;
        r.contact_number = contact.map(str::to_string);
        r.special_categories = Vec::new();
        r
    }

    #[test]
    fn test_normalize_mobile_formats() {
        for raw in [
            "09171234567",
            "0917-123-4567",
            "639171234567",
            "+639171234567",
            "+63 917 123 4567",
            "9171234567",
            "(0917) 123.4567",
        ] {
            assert_eq!(normalize_mobile(raw).as_deref(), Some("+639171234567"), "{raw}");
        }
    }

    #[test]
    fn test_normalize_mobile_rejects() {
        for raw in [
            "",
            "0281234567",
            "02-8123-4567",
            "0917123456",
            "091712345678",
            "+09171234567",
            "0917x234567",
            "+6391712345",
            "638171234567",
        ] {
            assert_eq!(normalize_mobile(raw), None, "{raw}");
        }
    }

    #[test]
    fn test_senior_by_tag_or_age() {
        let mut young = resident(1, Some("09171234567"));
        young.birth_date = NaiveDate::from_ymd_opt(2000, 1, 1);
        let senior_group = TargetGroup::SpecialCategory(SpecialCategory::SeniorCitizen);
        assert!(!matches_group(&young, senior_group, today()));

        let mut tagged = young.clone();
        tagged.special_categories = vec![SpecialCategory::SeniorCitizen];
        assert!(matches_group(&tagged, senior_group, today()));

        let mut old = young.clone();
        old.birth_date = NaiveDate::from_ymd_opt(1965, 6, 1);
        assert!(matches_group(&old, senior_group, today()));
        old.birth_date = NaiveDate::from_ymd_opt(1965, 6, 2);
        assert!(!matches_group(&old, senior_group, today()));

        old.birth_date = None;
        assert!(!matches_group(&old, senior_group, today()));
    }

    #[test]
    fn test_purok_and_category_groups() {
        let mut r = resident(1, Some("09171234567"));
        r.purok = Some(3);
        r.special_categories = vec![SpecialCategory::Pwd];
        assert!(matches_group(&r, TargetGroup::Purok(3), today()));
        assert!(!matches_group(&r, TargetGroup::Purok(1), today()));
        assert!(matches_group(&r, TargetGroup::SpecialCategory(SpecialCategory::Pwd), today()));
        assert!(!matches_group(&r, TargetGroup::SpecialCategory(SpecialCategory::Indigent), today()));
        assert!(matches_group(&r, TargetGroup::All, today()));
    }

    #[test]
    fn test_resolve_skips_inactive_invalid_and_duplicates() {
        let mut inactive = resident(3, Some("09170000003"));
        inactive.is_active = false;
        let residents = vec![
            resident(1, Some("0917 123 4567")),
            resident(2, Some("+639171234567")),
            inactive,
            resident(4, Some("02-8123-4567")),
            resident(5, None),
            resident(6, Some("09181112222")),
        ];
        let recipients = resolve_recipients(&residents, &[TargetGroup::All], today());
        assert_eq!(
            recipients,
            vec![
                Recipient {
                    resident_id: 1,
                    mobile: "+639171234567".to_string()
                },
                Recipient {
                    resident_id: 6,
                    mobile: "+639181112222".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_resolve_unions_groups() {
        let mut a = resident(1, Some("09170000001"));
        a.purok = Some(1);
        let mut b = resident(2, Some("09170000002"));
        b.purok = Some(2);
        b.special_categories = vec![SpecialCategory::SoloParent];
        let mut c = resident(3, Some("09170000003"));
        c.purok = Some(3);

        let groups = [
            TargetGroup::Purok(1),
            TargetGroup::SpecialCategory(SpecialCategory::SoloParent),
        ];
        let ids: Vec<i64> = resolve_recipients(&[a, b, c], &groups, today())
            .into_iter()
            .map(|r| r.resident_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(resolve_recipients(&[], &groups, today()).is_empty());
    }
}
