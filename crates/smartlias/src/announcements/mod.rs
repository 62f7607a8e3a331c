//! Announcements with SMS broadcast.
//!
//! Announcements start as drafts. Publishing makes them visible to residents
//! and, when SMS target groups are set, texts every matching resident once.

mod content;
mod sms;
mod targeting;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::AuthContext;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{
    Announcement, AnnouncementStatus, DeliveryStatus, SmsDelivery, SmsStatus, TargetGroup,
};
use crate::storage::Store;

pub use content::{
    blocked_terms, parse_target_groups, validate_content, validate_title, AnnouncementFields,
    AnnouncementInput, BlockedTerm, CONTENT_MAX_LEN, CONTENT_MIN_LEN, TITLE_MIN_LEN,
};
pub use sms::{compose_message, gateway_from_config, HttpGateway, LogGateway, SmsGateway};
pub use targeting::{matches_group, normalize_mobile, resolve_recipients, Recipient, SENIOR_AGE};

/// Result of an update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    /// The announcement as stored.
    pub announcement: Announcement,
    /// False when the submitted fields matched what was stored.
    pub changed: bool,
}

/// Result of publishing.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    /// The published announcement.
    pub announcement: Announcement,
    /// SMS results; all zero when no SMS was sent.
    pub sms: SmsStatus,
}

/// Announcement service.
#[derive(Debug)]
pub struct AnnouncementService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    gateway: Option<Arc<dyn SmsGateway>>,
}

impl AnnouncementService {
    /// Create the service. With no gateway, publishing sends nothing.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        gateway: Option<Arc<dyn SmsGateway>>,
    ) -> Self {
        Self {
            store,
            clock,
            gateway,
        }
    }

    fn fetch(&self, id: i64) -> Result<Announcement> {
        self.store
            .get_announcement(id)?
            .ok_or_else(|| Error::not_found("Announcement", id))
    }

    /// Create a draft.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input.
    pub fn create(&self, author: &AuthContext, input: &AnnouncementInput) -> Result<Announcement> {
        let fields = input.validate()?;
        let announcement = self.store.insert_announcement(Announcement {
            id: 0,
            title: fields.title,
            content: fields.content,
            kind: fields.kind,
            is_urgent: fields.is_urgent,
            target_groups: vec![TargetGroup::All],
            sms_target_groups: fields.sms_target_groups,
            status: AnnouncementStatus::Draft,
            published_at: None,
            created_by: Some(author.user.id),
            created_at: self.clock.now(),
            updated_at: None,
        })?;
        info!("Created announcement {} ({})", announcement.id, announcement.title);
        Ok(announcement)
    }

    /// Announcements visible to the caller, newest first.
    ///
    /// Staff see drafts too; residents only see published ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list(&self, viewer: &AuthContext) -> Result<Vec<Announcement>> {
        let mut announcements: Vec<Announcement> = self
            .store
            .list_announcements()?
            .into_iter()
            .filter(|a| viewer.is_admin() || a.is_published())
            .collect();
        announcements.sort_by(|a, b| {
            b.published_at
                .unwrap_or(b.created_at)
                .cmp(&a.published_at.unwrap_or(a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(announcements)
    }

    /// Fetch one announcement. Drafts are hidden from residents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown or hidden id.
    pub fn get(&self, viewer: &AuthContext, id: i64) -> Result<Announcement> {
        let announcement = self.fetch(id)?;
        if !viewer.is_admin() && !announcement.is_published() {
            return Err(Error::not_found("Announcement", id));
        }
        Ok(announcement)
    }

    /// Replace an announcement's fields.
    ///
    /// Any real change returns the announcement to draft so it must be
    /// published again. Submitting identical fields changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id or a validation error
    /// for bad input.
    pub fn update(&self, id: i64, input: &AnnouncementInput) -> Result<UpdateOutcome> {
        let mut announcement = self.fetch(id)?;
        let fields = input.validate()?;
        let current = AnnouncementFields {
            title: announcement.title.clone(),
            content: announcement.content.clone(),
            kind: announcement.kind,
            is_urgent: announcement.is_urgent,
            sms_target_groups: announcement.sms_target_groups.clone(),
        };
        if fields == current {
            return Ok(UpdateOutcome {
                announcement,
                changed: false,
            });
        }

        announcement.title = fields.title;
        announcement.content = fields.content;
        announcement.kind = fields.kind;
        announcement.is_urgent = fields.is_urgent;
        announcement.sms_target_groups = fields.sms_target_groups;
        announcement.status = AnnouncementStatus::Draft;
        announcement.published_at = None;
        announcement.updated_at = Some(self.clock.now());
        self.store.update_announcement(&announcement)?;
        info!("Updated announcement {}", announcement.id);
        Ok(UpdateOutcome {
            announcement,
            changed: true,
        })
    }

    /// Publish a draft and text its SMS audience.
    ///
    /// Individual send failures are recorded as failed deliveries and do not
    /// undo the publish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id or [`Error::Conflict`]
    /// if it is already published.
    pub async fn publish(&self, id: i64) -> Result<PublishOutcome> {
        let mut announcement = self.fetch(id)?;
        if announcement.is_published() {
            return Err(Error::conflict("Announcement is already published"));
        }
        let now = self.clock.now();
        // Only one of two concurrent publishes wins the draft.
        if !self.store.publish_announcement(id, now)? {
            return Err(Error::conflict("Announcement is already published"));
        }
        announcement.status = AnnouncementStatus::Published;
        announcement.published_at = Some(now);
        announcement.updated_at = Some(now);
        info!("Published announcement {}", announcement.id);

        let sms = match &self.gateway {
            Some(gateway) if !announcement.sms_target_groups.is_empty() => {
                self.broadcast(gateway.as_ref(), &announcement).await?
            }
            _ => SmsStatus::default(),
        };
        Ok(PublishOutcome { announcement, sms })
    }

    async fn broadcast(
        &self,
        gateway: &dyn SmsGateway,
        announcement: &Announcement,
    ) -> Result<SmsStatus> {
        let residents = self.store.list_residents()?;
        let recipients = resolve_recipients(
            &residents,
            &announcement.sms_target_groups,
            self.clock.today(),
        );
        let message = compose_message(announcement);

        let mut deliveries = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let outcome = gateway.send(&recipient.mobile, &message).await;
            if let Err(e) = &outcome {
                warn!("SMS to {} failed: {e}", recipient.mobile);
            }
            deliveries.push(SmsDelivery {
                id: 0,
                announcement_id: announcement.id,
                recipient: recipient.mobile,
                resident_id: Some(recipient.resident_id),
                status: if outcome.is_ok() {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                },
                error: outcome.err().map(|e| e.to_string()),
                attempted_at: self.clock.now(),
            });
        }

        let deliveries = self.store.insert_deliveries(deliveries)?;
        let status = SmsStatus::from_deliveries(&deliveries);
        info!(
            "Announcement {} SMS: {} sent, {} failed",
            announcement.id, status.successful_sends, status.failed_sends
        );
        Ok(status)
    }

    /// Delete an announcement and its delivery records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_announcement(id)? {
            return Err(Error::not_found("Announcement", id));
        }
        info!("Deleted announcement {id}");
        Ok(())
    }

    /// SMS delivery counts for an announcement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn sms_status(&self, id: i64) -> Result<SmsStatus> {
        self.fetch(id)?;
        Ok(SmsStatus::from_deliveries(&self.store.deliveries_for(id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, LockoutPolicy, NewAccount, PinHasher};
    use crate::clock::ManualClock;
    use crate::model::{AnnouncementKind, Role, SpecialCategory};
    use crate::storage::{contract, SqliteStore};
    use chrono::{Duration, TimeZone, Utc};
    use sms::RecordingGateway;

    const BODY: &str = "Free check-ups at the barangay hall on Saturday morning.";

    struct Fixture {
        service: AnnouncementService,
        store: Arc<dyn Store>,
        clock: ManualClock,
        gateway: Arc<RecordingGateway>,
        admin: AuthContext,
        resident: AuthContext,
    }

    fn login(auth: &AuthService, first: &str, role: Role) -> AuthContext {
        let user = auth
            .register(&NewAccount {
                first_name: first,
                last_name: "Santos",
                role,
                pin: "123456",
                pin_changed: true,
            })
            .unwrap();
        let response = auth.login(&user.username, "123456").unwrap();
        auth.authenticate(&response.token).unwrap()
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let gateway = Arc::new(RecordingGateway {
            failing: vec!["+639170000002".to_string()],
            ..RecordingGateway::default()
        });
        let auth = AuthService::new(
            store.clone(),
            clock_arc.clone(),
            PinHasher::new("test-pepper"),
            LockoutPolicy::default(),
            Duration::hours(24),
        );
        let admin = login(&auth, "Admin", Role::Admin);
        let resident = login(&auth, "Maria", Role::Resident);
        let sms: Arc<dyn SmsGateway> = gateway.clone();
        let service = AnnouncementService::new(store.clone(), clock_arc, Some(sms));
        Fixture {
            service,
            store,
            clock,
            gateway,
            admin,
            resident,
        }
    }

    fn input(title: &str) -> AnnouncementInput {
        AnnouncementInput {
            title: title.to_string(),
            content: BODY.to_string(),
            ..AnnouncementInput::default()
        }
    }

    fn sms_input(title: &str, groups: &[&str]) -> AnnouncementInput {
        AnnouncementInput {
            send_sms: true,
            sms_target_groups: groups.iter().map(|g| (*g).to_string()).collect(),
            ..input(title)
        }
    }

    fn add_resident(store: &dyn Store, contact: &str, purok: u8, active: bool) {
        let mut r = contract::resident("Juan", "Cruz");
        r.contact_number = Some(contact.to_string());
        r.purok = Some(purok);
        r.special_categories = Vec::new();
        r.is_active = active;
        store.insert_resident(r).unwrap();
    }

    #[test]
    fn test_create_is_draft_by_author() {
        let f = fixture();
        let a = f.service.create(&f.admin, &input("Medical mission")).unwrap();
        assert_eq!(a.status, AnnouncementStatus::Draft);
        assert_eq!(a.created_by, Some(f.admin.user.id));
        assert_eq!(a.kind, AnnouncementKind::General);
        assert_eq!(a.target_groups, vec![TargetGroup::All]);
        assert!(f.service.create(&f.admin, &input("Short")).is_err());
    }

    #[tokio::test]
    async fn test_residents_only_see_published_newest_first() {
        let f = fixture();
        let first = f.service.create(&f.admin, &input("Medical mission")).unwrap();
        f.clock.advance(Duration::hours(1));
        let second = f.service.create(&f.admin, &input("Clean-up drive")).unwrap();
        f.clock.advance(Duration::hours(1));
        let draft = f.service.create(&f.admin, &input("Budget hearing")).unwrap();

        f.service.publish(second.id).await.unwrap();
        f.clock.advance(Duration::hours(1));
        f.service.publish(first.id).await.unwrap();

        let ids: Vec<i64> = f.service.list(&f.resident).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(f.service.list(&f.admin).unwrap().len(), 3);

        assert!(f.service.get(&f.resident, draft.id).unwrap_err().is_not_found());
        assert_eq!(f.service.get(&f.admin, draft.id).unwrap().id, draft.id);
    }

    #[tokio::test]
    async fn test_publish_sends_to_targets_and_records_deliveries() {
        let f = fixture();
        add_resident(f.store.as_ref(), "09170000001", 1, true);
        add_resident(f.store.as_ref(), "0917 000 0002", 1, true);
        add_resident(f.store.as_ref(), "+639170000001", 1, true);
        add_resident(f.store.as_ref(), "09170000003", 1, false);
        add_resident(f.store.as_ref(), "09170000004", 2, true);
        add_resident(f.store.as_ref(), "028123456", 1, true);

        let a = f
            .service
            .create(&f.admin, &sms_input("Water interruption", &["purok:1"]))
            .unwrap();
        let outcome = f.service.publish(a.id).await.unwrap();
        assert!(outcome.announcement.is_published());
        assert_eq!(outcome.announcement.published_at, Some(f.clock.now()));
        assert_eq!(
            outcome.sms,
            SmsStatus {
                total_recipients: 2,
                successful_sends: 1,
                failed_sends: 1
            }
        );
        assert_eq!(f.service.sms_status(a.id).unwrap(), outcome.sms);

        let sent = f.gateway.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+639170000001");
        assert!(sent[0].1.starts_with("Water interruption"));

        let deliveries = f.store.deliveries_for(a.id).unwrap();
        let failed = deliveries
            .iter()
            .find(|d| d.status == DeliveryStatus::Failed)
            .unwrap();
        assert_eq!(failed.recipient, "+639170000002");
        assert!(failed.error.as_deref().unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn test_publish_twice_conflicts() {
        let f = fixture();
        let a = f.service.create(&f.admin, &input("Medical mission")).unwrap();
        f.service.publish(a.id).await.unwrap();
        let err = f.service.publish(a.id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(f.service.publish(999).await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishes_broadcast_once() {
        let f = fixture();
        add_resident(f.store.as_ref(), "09170000001", 1, true);
        let a = f
            .service
            .create(&f.admin, &sms_input("Water interruption", &["purok:1"]))
            .unwrap();

        let id = a.id;
        let service = Arc::new(f.service);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.publish(id).await })
            })
            .collect();
        let mut published = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => published += 1,
                Err(e) => assert!(matches!(e, Error::Conflict(_)), "got {e:?}"),
            }
        }

        assert_eq!(published, 1);
        assert_eq!(f.gateway.sent.lock().unwrap().len(), 1);
        assert_eq!(f.store.deliveries_for(id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_sms_groups_or_gateway_sends_nothing() {
        let f = fixture();
        add_resident(f.store.as_ref(), "09170000001", 1, true);
        let a = f.service.create(&f.admin, &input("Medical mission")).unwrap();
        assert_eq!(f.service.publish(a.id).await.unwrap().sms, SmsStatus::default());

        let quiet = AnnouncementService::new(f.store.clone(), Arc::new(f.clock.clone()), None);
        let b = quiet
            .create(&f.admin, &sms_input("Clean-up drive", &["all"]))
            .unwrap();
        assert_eq!(quiet.publish(b.id).await.unwrap().sms.total_recipients, 0);
        assert!(f.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_detects_no_changes_and_returns_to_draft() {
        let f = fixture();
        let a = f.service.create(&f.admin, &input("Medical mission")).unwrap();
        f.service.publish(a.id).await.unwrap();

        let same = f.service.update(a.id, &input("  Medical mission ")).unwrap();
        assert!(!same.changed);
        assert!(same.announcement.is_published());

        f.clock.advance(Duration::minutes(5));
        let mut edit = sms_input("Medical mission", &["special_category:SENIOR_CITIZEN"]);
        edit.is_urgent = true;
        let changed = f.service.update(a.id, &edit).unwrap();
        assert!(changed.changed);
        assert_eq!(changed.announcement.status, AnnouncementStatus::Draft);
        assert_eq!(changed.announcement.published_at, None);
        assert_eq!(changed.announcement.updated_at, Some(f.clock.now()));
        assert_eq!(
            changed.announcement.sms_target_groups,
            vec![TargetGroup::SpecialCategory(SpecialCategory::SeniorCitizen)]
        );
        assert!(f.service.update(999, &edit).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_deliveries() {
        let f = fixture();
        add_resident(f.store.as_ref(), "09170000001", 1, true);
        let a = f
            .service
            .create(&f.admin, &sms_input("Water interruption", &["all"]))
            .unwrap();
        f.service.publish(a.id).await.unwrap();
        assert_eq!(f.store.deliveries_for(a.id).unwrap().len(), 1);

        f.service.delete(a.id).unwrap();
        assert!(f.store.deliveries_for(a.id).unwrap().is_empty());
        assert!(f.service.delete(a.id).unwrap_err().is_not_found());
        assert!(f.service.sms_status(a.id).unwrap_err().is_not_found());
    }
}
