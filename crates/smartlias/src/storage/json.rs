//! JSON file backend.
//!
//! Each collection lives in its own pretty-printed file under the data
//! directory. Files are loaded once at open; every write replaces the
//! affected file through a temporary file and a rename, so a crash never
//! leaves half a file behind.
//!
//! Hand-maintained seed files may wrap the array in an object keyed by the
//! collection name (`{"users": [...]}`) and may start with a
//! `{"_comment": "..."}` element; both load fine. A missing file is an empty
//! collection, while a file that does not parse is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    Announcement, AnnouncementStatus, DocumentRequest, Resident, SmsDelivery, User,
};

use super::Store;

const RESIDENTS: &str = "residents";
const USERS: &str = "users";
const ANNOUNCEMENTS: &str = "announcements";
const DELIVERIES: &str = "sms_deliveries";
const DOCUMENTS: &str = "document_requests";

/// Records with a numeric id.
trait Keyed {
    fn key(&self) -> i64;
    fn set_key(&mut self, id: i64);
}

macro_rules! keyed {
    ($($ty:ty),*) => {
        $(impl Keyed for $ty {
            fn key(&self) -> i64 {
                self.id
            }
            fn set_key(&mut self, id: i64) {
                self.id = id;
            }
        })*
    };
}

keyed!(Resident, User, Announcement, SmsDelivery, DocumentRequest);

#[derive(Debug, Default)]
struct Collections {
    residents: Vec<Resident>,
    users: Vec<User>,
    announcements: Vec<Announcement>,
    deliveries: Vec<SmsDelivery>,
    documents: Vec<DocumentRequest>,
}

/// Records kept as JSON files in a directory.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    data: Mutex<Collections>,
}

impl JsonStore {
    /// Open a data directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a data file
    /// exists but cannot be parsed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }

        let data = Collections {
            residents: load_collection(&dir, RESIDENTS)?,
            users: load_collection(&dir, USERS)?,
            announcements: load_collection(&dir, ANNOUNCEMENTS)?,
            deliveries: load_collection(&dir, DELIVERIES)?,
            documents: load_collection(&dir, DOCUMENTS)?,
        };
        info!(
            "Loaded JSON data from {} ({} residents, {} users)",
            dir.display(),
            data.residents.len(),
            data.users.len()
        );

        Ok(Self {
            dir,
            data: Mutex::new(data),
        })
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data(&self) -> Result<MutexGuard<'_, Collections>> {
        self.data
            .lock()
            .map_err(|_| Error::internal("data store lock poisoned"))
    }

    /// Apply `change` to a copy of one collection, persist it, then keep it.
    fn mutate<T, R>(
        &self,
        name: &str,
        select: fn(&mut Collections) -> &mut Vec<T>,
        change: impl FnOnce(&mut Vec<T>) -> Result<R>,
    ) -> Result<R>
    where
        T: Clone + Serialize,
    {
        let mut data = self.data()?;
        let mut items = select(&mut data).clone();
        let result = change(&mut items)?;
        save_collection(&self.dir, name, &items)?;
        *select(&mut data) = items;
        Ok(result)
    }

    fn insert<T>(
        &self,
        name: &str,
        select: fn(&mut Collections) -> &mut Vec<T>,
        mut record: T,
    ) -> Result<T>
    where
        T: Clone + Serialize + Keyed,
    {
        self.mutate(name, select, |items| {
            record.set_key(next_id(items));
            items.push(record.clone());
            Ok(record)
        })
    }

    fn replace<T>(
        &self,
        name: &str,
        select: fn(&mut Collections) -> &mut Vec<T>,
        record: &T,
    ) -> Result<bool>
    where
        T: Clone + Serialize + Keyed,
    {
        let exists = select(&mut *self.data()?)
            .iter()
            .any(|item| item.key() == record.key());
        if !exists {
            return Ok(false);
        }
        self.mutate(name, select, |items| {
            if let Some(slot) = items.iter_mut().find(|item| item.key() == record.key()) {
                *slot = record.clone();
            }
            Ok(true)
        })
    }

    fn find<T: Clone>(
        &self,
        select: fn(&mut Collections) -> &mut Vec<T>,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Option<T>> {
        Ok(select(&mut *self.data()?)
            .iter()
            .find(|item| predicate(item))
            .cloned())
    }

    fn all<T: Clone + Keyed>(&self, select: fn(&mut Collections) -> &mut Vec<T>) -> Result<Vec<T>> {
        let mut items = select(&mut *self.data()?).clone();
        items.sort_by_key(Keyed::key);
        Ok(items)
    }
}

fn residents(c: &mut Collections) -> &mut Vec<Resident> {
    &mut c.residents
}

fn users(c: &mut Collections) -> &mut Vec<User> {
    &mut c.users
}

fn announcements(c: &mut Collections) -> &mut Vec<Announcement> {
    &mut c.announcements
}

fn deliveries(c: &mut Collections) -> &mut Vec<SmsDelivery> {
    &mut c.deliveries
}

fn documents(c: &mut Collections) -> &mut Vec<DocumentRequest> {
    &mut c.documents
}

fn next_id<T: Keyed>(items: &[T]) -> i64 {
    items.iter().map(Keyed::key).max().unwrap_or(0) + 1
}

fn collection_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

fn data_file_error(path: &Path, message: impl Into<String>) -> Error {
    Error::DataFile {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn is_comment(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("_comment"))
}

fn load_collection<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = collection_path(dir, name);
    if !path.exists() {
        debug!("No {} yet, starting empty", path.display());
        return Ok(Vec::new());
    }

    let text = fs::read_to_string(&path)?;
    let value: Value =
        serde_json::from_str(&text).map_err(|e| data_file_error(&path, e.to_string()))?;
    let elements = match value {
        Value::Array(elements) => elements,
        Value::Object(mut object) => match object.remove(name) {
            Some(Value::Array(elements)) => elements,
            _ => {
                return Err(data_file_error(
                    &path,
                    format!("expected an array or an object with a \"{name}\" array"),
                ))
            }
        },
        _ => return Err(data_file_error(&path, "expected an array")),
    };

    elements
        .into_iter()
        .enumerate()
        .filter(|(_, element)| !is_comment(element))
        .map(|(index, element)| {
            serde_json::from_value(element)
                .map_err(|e| data_file_error(&path, format!("entry {index}: {e}")))
        })
        .collect()
}

fn save_collection<T: Serialize>(dir: &Path, name: &str, items: &[T]) -> Result<()> {
    let path = collection_path(dir, name);
    let tmp = dir.join(format!(".{name}.json.tmp"));
    let json = serde_json::to_string_pretty(items)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, &path)?;
    debug!("Wrote {} records to {}", items.len(), path.display());
    Ok(())
}

impl Store for JsonStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    fn insert_resident(&self, resident: Resident) -> Result<Resident> {
        self.insert(RESIDENTS, residents, resident)
    }

    fn get_resident(&self, id: i64) -> Result<Option<Resident>> {
        self.find(residents, |r| r.id == id)
    }

    fn find_resident_by_user(&self, user_id: i64) -> Result<Option<Resident>> {
        self.find(residents, |r| r.user_id == Some(user_id))
    }

    fn update_resident(&self, resident: &Resident) -> Result<bool> {
        self.replace(RESIDENTS, residents, resident)
    }

    fn list_residents(&self) -> Result<Vec<Resident>> {
        self.all(residents)
    }

    fn insert_user(&self, mut user: User) -> Result<User> {
        // The name check and the push share one guard.
        self.mutate(USERS, users, |items| {
            if items
                .iter()
                .any(|u| u.username.eq_ignore_ascii_case(&user.username))
            {
                return Err(Error::conflict(format!(
                    "Username {} is already taken",
                    user.username
                )));
            }
            user.set_key(next_id(items));
            items.push(user.clone());
            Ok(user)
        })
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.find(users, |u| u.id == id)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find(users, |u| u.username.eq_ignore_ascii_case(username))
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        self.replace(USERS, users, user)
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        self.mutate(USERS, users, |items| {
            let before = items.len();
            items.retain(|u| u.id != id);
            Ok(items.len() < before)
        })
    }

    fn list_usernames(&self) -> Result<Vec<String>> {
        Ok(self.all(users)?.into_iter().map(|u| u.username).collect())
    }

    fn insert_announcement(&self, announcement: Announcement) -> Result<Announcement> {
        self.insert(ANNOUNCEMENTS, announcements, announcement)
    }

    fn get_announcement(&self, id: i64) -> Result<Option<Announcement>> {
        self.find(announcements, |a| a.id == id)
    }

    fn update_announcement(&self, announcement: &Announcement) -> Result<bool> {
        self.replace(ANNOUNCEMENTS, announcements, announcement)
    }

    fn publish_announcement(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        self.mutate(ANNOUNCEMENTS, announcements, |items| {
            let Some(draft) = items
                .iter_mut()
                .find(|a| a.id == id && a.status == AnnouncementStatus::Draft)
            else {
                return Ok(false);
            };
            draft.status = AnnouncementStatus::Published;
            draft.published_at = Some(at);
            draft.updated_at = Some(at);
            Ok(true)
        })
    }

    fn delete_announcement(&self, id: i64) -> Result<bool> {
        let mut data = self.data()?;
        if !data.announcements.iter().any(|a| a.id == id) {
            return Ok(false);
        }

        let mut remaining_deliveries = data.deliveries.clone();
        remaining_deliveries.retain(|d| d.announcement_id != id);
        let mut remaining = data.announcements.clone();
        remaining.retain(|a| a.id != id);

        save_collection(&self.dir, DELIVERIES, &remaining_deliveries)?;
        data.deliveries = remaining_deliveries;
        save_collection(&self.dir, ANNOUNCEMENTS, &remaining)?;
        data.announcements = remaining;
        Ok(true)
    }

    fn list_announcements(&self) -> Result<Vec<Announcement>> {
        self.all(announcements)
    }

    fn insert_deliveries(&self, new: Vec<SmsDelivery>) -> Result<Vec<SmsDelivery>> {
        self.mutate(DELIVERIES, deliveries, |items| {
            let mut id = next_id(items);
            let mut saved = Vec::with_capacity(new.len());
            for mut delivery in new {
                delivery.id = id;
                id += 1;
                items.push(delivery.clone());
                saved.push(delivery);
            }
            Ok(saved)
        })
    }

    fn deliveries_for(&self, announcement_id: i64) -> Result<Vec<SmsDelivery>> {
        Ok(self
            .all(deliveries)?
            .into_iter()
            .filter(|d| d.announcement_id == announcement_id)
            .collect())
    }

    fn insert_document_request(&self, request: DocumentRequest) -> Result<DocumentRequest> {
        self.insert(DOCUMENTS, documents, request)
    }

    fn get_document_request(&self, id: i64) -> Result<Option<DocumentRequest>> {
        self.find(documents, |d| d.id == id)
    }

    fn update_document_request(&self, request: &DocumentRequest) -> Result<bool> {
        self.replace(DOCUMENTS, documents, request)
    }

    fn list_document_requests(&self) -> Result<Vec<DocumentRequest>> {
        self.all(documents)
    }
}
