//! Typed records for every table
//!
//! The store speaks row maps ([`RowValues`] in, [`Row`] out). These records
//! are the typed view callers usually want:
//! - `FileRecord`: one file or folder
//! - `ShareRecord`: one sharing grant
//! - `CapabilitySet`: server capabilities for one account
//! - `UploadRecord`: one pending or finished upload
//! - `CameraUploadCursor`: last synced media timestamps
//! - `QuotaRecord`: storage quota of one account
//! - `UserAvatar`: cached avatar metadata (not routed)
//!
//! Enumerated columns are stored as stable integer codes.

use crate::row::{Row, RowValues};
use crate::storage::schema::{self, avatar, camera, capability, file, quota, share, upload};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of sharing grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareType {
    User,
    Group,
    PublicLink,
    Federated,
}

impl ShareType {
    pub fn code(&self) -> i64 {
        match self {
            ShareType::User => 0,
            ShareType::Group => 1,
            ShareType::PublicLink => 3,
            ShareType::Federated => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ShareType::User),
            1 => Some(ShareType::Group),
            3 => Some(ShareType::PublicLink),
            6 => Some(ShareType::Federated),
            _ => None,
        }
    }

    /// Whether this grant marks the file as shared with a sharee
    /// (as opposed to shared by link)
    pub fn is_sharee(&self) -> bool {
        !matches!(self, ShareType::PublicLink)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareType::User => "user",
            ShareType::Group => "group",
            ShareType::PublicLink => "public_link",
            ShareType::Federated => "federated",
        }
    }
}

impl FromStr for ShareType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ShareType::User),
            "group" => Ok(ShareType::Group),
            "public_link" | "link" | "public" => Ok(ShareType::PublicLink),
            "federated" | "remote" => Ok(ShareType::Federated),
            _ => Err(Error::ConstraintViolation(format!("Unknown share type: {}", s))),
        }
    }
}

impl std::fmt::Display for ShareType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    InProgress,
    Failed,
    Succeeded,
}

impl UploadStatus {
    pub fn code(&self) -> i64 {
        match self {
            UploadStatus::InProgress => 0,
            UploadStatus::Failed => 1,
            UploadStatus::Succeeded => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UploadStatus::InProgress),
            1 => Some(UploadStatus::Failed),
            2 => Some(UploadStatus::Succeeded),
            _ => None,
        }
    }
}

/// What happens to the local file once the upload finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalBehaviour {
    Copy,
    Move,
    Forget,
}

impl LocalBehaviour {
    pub fn code(&self) -> i64 {
        match self {
            LocalBehaviour::Copy => 0,
            LocalBehaviour::Move => 1,
            LocalBehaviour::Forget => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LocalBehaviour::Copy),
            1 => Some(LocalBehaviour::Move),
            2 => Some(LocalBehaviour::Forget),
            _ => None,
        }
    }
}

/// Who enqueued an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadCreator {
    User,
    CameraUploadPicture,
    CameraUploadVideo,
}

impl UploadCreator {
    pub fn code(&self) -> i64 {
        match self {
            UploadCreator::User => 0,
            UploadCreator::CameraUploadPicture => 1,
            UploadCreator::CameraUploadVideo => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UploadCreator::User),
            1 => Some(UploadCreator::CameraUploadPicture),
            2 => Some(UploadCreator::CameraUploadVideo),
            _ => None,
        }
    }
}

/// One file or folder of an account's tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Option<i64>,
    pub name: String,
    /// Remote path; folders end with `/`
    pub path: String,
    /// Id of the containing folder, 0 for the account root
    pub parent_id: i64,
    pub creation: i64,
    pub modified: i64,
    /// `DIR` for folders, a MIME type otherwise
    pub content_type: String,
    pub content_length: i64,
    /// Local copy, present only while cached on the device
    pub storage_path: Option<String>,
    pub account_owner: String,
    pub last_sync_date: i64,
    pub last_sync_date_for_data: i64,
    pub modified_at_last_sync_for_data: i64,
    pub keep_in_sync: bool,
    pub etag: Option<String>,
    pub tree_etag: Option<String>,
    pub shared_via_link: bool,
    pub shared_with_sharee: bool,
    pub permissions: Option<String>,
    pub remote_id: Option<String>,
    pub private_link: Option<String>,
    pub etag_in_conflict: Option<String>,
    pub update_thumbnail: bool,
    pub is_downloading: bool,
}

impl FileRecord {
    /// A folder at `path` under `parent_id`
    pub fn folder(account: impl Into<String>, path: impl Into<String>, parent_id: i64) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path),
            path,
            parent_id,
            content_type: schema::DIR_CONTENT_TYPE.to_string(),
            account_owner: account.into(),
            ..Default::default()
        }
    }

    /// A regular file at `path` under `parent_id`
    pub fn file(
        account: impl Into<String>,
        path: impl Into<String>,
        parent_id: i64,
        content_type: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            name: last_segment(&path),
            path,
            parent_id,
            content_type: content_type.into(),
            account_owner: account.into(),
            ..Default::default()
        }
    }

    pub fn is_folder(&self) -> bool {
        self.content_type == schema::DIR_CONTENT_TYPE
    }

    /// Write map with every column; the id is included only when known
    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(file::NAME, &self.name)
            .with(file::PATH, &self.path)
            .with(file::PARENT, self.parent_id)
            .with(file::CREATION, self.creation)
            .with(file::MODIFIED, self.modified)
            .with(file::CONTENT_TYPE, &self.content_type)
            .with(file::CONTENT_LENGTH, self.content_length)
            .with(file::STORAGE_PATH, self.storage_path.clone())
            .with(file::ACCOUNT_OWNER, &self.account_owner)
            .with(file::LAST_SYNC_DATE, self.last_sync_date)
            .with(file::LAST_SYNC_DATE_FOR_DATA, self.last_sync_date_for_data)
            .with(file::MODIFIED_AT_LAST_SYNC_FOR_DATA, self.modified_at_last_sync_for_data)
            .with(file::KEEP_IN_SYNC, self.keep_in_sync)
            .with(file::ETAG, self.etag.clone())
            .with(file::TREE_ETAG, self.tree_etag.clone())
            .with(file::SHARED_VIA_LINK, self.shared_via_link)
            .with(file::SHARED_WITH_SHAREE, self.shared_with_sharee)
            .with(file::PERMISSIONS, self.permissions.clone())
            .with(file::REMOTE_ID, self.remote_id.clone())
            .with(file::PRIVATE_LINK, self.private_link.clone())
            .with(file::ETAG_IN_CONFLICT, self.etag_in_conflict.clone())
            .with(file::UPDATE_THUMBNAIL, self.update_thumbnail)
            .with(file::IS_DOWNLOADING, self.is_downloading)
    }

    /// Build from a row projected with storage column names
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get_i64(schema::ID),
            name: row.get_string(file::NAME).unwrap_or_default(),
            path: row.get_string(file::PATH).unwrap_or_default(),
            parent_id: row.get_i64(file::PARENT).unwrap_or(0),
            creation: row.get_i64(file::CREATION).unwrap_or(0),
            modified: row.get_i64(file::MODIFIED).unwrap_or(0),
            content_type: row.get_string(file::CONTENT_TYPE).unwrap_or_default(),
            content_length: row.get_i64(file::CONTENT_LENGTH).unwrap_or(0),
            storage_path: row.get_string(file::STORAGE_PATH),
            account_owner: row.get_string(file::ACCOUNT_OWNER).unwrap_or_default(),
            last_sync_date: row.get_i64(file::LAST_SYNC_DATE).unwrap_or(0),
            last_sync_date_for_data: row.get_i64(file::LAST_SYNC_DATE_FOR_DATA).unwrap_or(0),
            modified_at_last_sync_for_data: row
                .get_i64(file::MODIFIED_AT_LAST_SYNC_FOR_DATA)
                .unwrap_or(0),
            keep_in_sync: row.get_bool(file::KEEP_IN_SYNC),
            etag: row.get_string(file::ETAG),
            tree_etag: row.get_string(file::TREE_ETAG),
            shared_via_link: row.get_bool(file::SHARED_VIA_LINK),
            shared_with_sharee: row.get_bool(file::SHARED_WITH_SHAREE),
            permissions: row.get_string(file::PERMISSIONS),
            remote_id: row.get_string(file::REMOTE_ID),
            private_link: row.get_string(file::PRIVATE_LINK),
            etag_in_conflict: row.get_string(file::ETAG_IN_CONFLICT),
            update_thumbnail: row.get_bool(file::UPDATE_THUMBNAIL),
            is_downloading: row.get_bool(file::IS_DOWNLOADING),
        }
    }
}

fn last_segment(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// One sharing grant on a remote path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: Option<i64>,
    pub file_source: i64,
    pub item_source: i64,
    pub share_type: ShareType,
    pub share_with: Option<String>,
    pub path: String,
    pub permissions: i64,
    pub shared_date: i64,
    pub expiration_date: i64,
    pub token: Option<String>,
    pub share_with_display_name: Option<String>,
    pub share_with_additional_info: Option<String>,
    pub is_directory: bool,
    pub user_id: i64,
    pub remote_id: i64,
    pub account_owner: String,
    pub name: Option<String>,
    pub url: Option<String>,
}

impl ShareRecord {
    pub fn new(
        share_type: ShareType,
        account: impl Into<String>,
        path: impl Into<String>,
        remote_id: i64,
    ) -> Self {
        Self {
            id: None,
            file_source: 0,
            item_source: 0,
            share_type,
            share_with: None,
            path: path.into(),
            permissions: 1,
            shared_date: 0,
            expiration_date: 0,
            token: None,
            share_with_display_name: None,
            share_with_additional_info: None,
            is_directory: false,
            user_id: 0,
            remote_id,
            account_owner: account.into(),
            name: None,
            url: None,
        }
    }

    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(share::FILE_SOURCE, self.file_source)
            .with(share::ITEM_SOURCE, self.item_source)
            .with(share::SHARE_TYPE, self.share_type.code())
            .with(share::SHARE_WITH, self.share_with.clone())
            .with(share::PATH, &self.path)
            .with(share::PERMISSIONS, self.permissions)
            .with(share::SHARED_DATE, self.shared_date)
            .with(share::EXPIRATION_DATE, self.expiration_date)
            .with(share::TOKEN, self.token.clone())
            .with(share::SHARE_WITH_DISPLAY_NAME, self.share_with_display_name.clone())
            .with(share::SHARE_WITH_ADDITIONAL_INFO, self.share_with_additional_info.clone())
            .with(share::IS_DIRECTORY, self.is_directory)
            .with(share::USER_ID, self.user_id)
            .with(share::ID_REMOTE_SHARED, self.remote_id)
            .with(share::ACCOUNT_OWNER, &self.account_owner)
            .with(share::NAME, self.name.clone())
            .with(share::URL, self.url.clone())
    }

    /// Build from a row; fails on an unknown share type code
    pub fn from_row(row: &Row) -> Result<Self> {
        let code = row.get_i64(share::SHARE_TYPE).unwrap_or(-1);
        let share_type = ShareType::from_code(code).ok_or_else(|| {
            Error::ConstraintViolation(format!("Unknown share type code: {}", code))
        })?;
        Ok(Self {
            id: row.get_i64(schema::ID),
            file_source: row.get_i64(share::FILE_SOURCE).unwrap_or(0),
            item_source: row.get_i64(share::ITEM_SOURCE).unwrap_or(0),
            share_type,
            share_with: row.get_string(share::SHARE_WITH),
            path: row.get_string(share::PATH).unwrap_or_default(),
            permissions: row.get_i64(share::PERMISSIONS).unwrap_or(0),
            shared_date: row.get_i64(share::SHARED_DATE).unwrap_or(0),
            expiration_date: row.get_i64(share::EXPIRATION_DATE).unwrap_or(0),
            token: row.get_string(share::TOKEN),
            share_with_display_name: row.get_string(share::SHARE_WITH_DISPLAY_NAME),
            share_with_additional_info: row.get_string(share::SHARE_WITH_ADDITIONAL_INFO),
            is_directory: row.get_bool(share::IS_DIRECTORY),
            user_id: row.get_i64(share::USER_ID).unwrap_or(0),
            remote_id: row.get_i64(share::ID_REMOTE_SHARED).unwrap_or(0),
            account_owner: row.get_string(share::ACCOUNT_OWNER).unwrap_or_default(),
            name: row.get_string(share::NAME),
            url: row.get_string(share::URL),
        })
    }
}

/// Server capabilities of one account.
///
/// Tri-state flags use `-1` for "unknown" (server did not report them),
/// `0` for false and `1` for true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub id: Option<i64>,
    pub account_name: String,
    pub version_major: i64,
    pub version_minor: i64,
    pub version_micro: i64,
    pub version_string: Option<String>,
    pub version_edition: Option<String>,
    pub core_poll_interval: i64,
    pub sharing_api_enabled: i64,
    pub sharing_public_enabled: i64,
    pub sharing_public_password_enforced: i64,
    pub sharing_public_password_enforced_read_only: Option<i64>,
    pub sharing_public_password_enforced_read_write: Option<i64>,
    pub sharing_public_password_enforced_upload_only: Option<i64>,
    pub sharing_public_expire_date_enabled: i64,
    pub sharing_public_expire_date_days: i64,
    pub sharing_public_expire_date_enforced: i64,
    pub sharing_public_send_mail: i64,
    pub sharing_public_upload: i64,
    pub sharing_public_multiple: i64,
    pub sharing_public_supports_upload_only: i64,
    pub sharing_user_send_mail: i64,
    pub sharing_resharing: i64,
    pub sharing_federation_outgoing: i64,
    pub sharing_federation_incoming: i64,
    pub files_bigfilechunking: i64,
    pub files_undelete: i64,
    pub files_versioning: i64,
}

impl CapabilitySet {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account_name: account.into(),
            sharing_public_multiple: -1,
            sharing_public_supports_upload_only: -1,
            ..Default::default()
        }
    }

    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(capability::ACCOUNT_NAME, &self.account_name)
            .with(capability::VERSION_MAJOR, self.version_major)
            .with(capability::VERSION_MINOR, self.version_minor)
            .with(capability::VERSION_MICRO, self.version_micro)
            .with(capability::VERSION_STRING, self.version_string.clone())
            .with(capability::VERSION_EDITION, self.version_edition.clone())
            .with(capability::CORE_POLL_INTERVAL, self.core_poll_interval)
            .with(capability::SHARING_API_ENABLED, self.sharing_api_enabled)
            .with(capability::SHARING_PUBLIC_ENABLED, self.sharing_public_enabled)
            .with(
                capability::SHARING_PUBLIC_PASSWORD_ENFORCED,
                self.sharing_public_password_enforced,
            )
            .with(
                capability::SHARING_PUBLIC_PASSWORD_ENFORCED_READ_ONLY,
                self.sharing_public_password_enforced_read_only,
            )
            .with(
                capability::SHARING_PUBLIC_PASSWORD_ENFORCED_READ_WRITE,
                self.sharing_public_password_enforced_read_write,
            )
            .with(
                capability::SHARING_PUBLIC_PASSWORD_ENFORCED_UPLOAD_ONLY,
                self.sharing_public_password_enforced_upload_only,
            )
            .with(
                capability::SHARING_PUBLIC_EXPIRE_DATE_ENABLED,
                self.sharing_public_expire_date_enabled,
            )
            .with(
                capability::SHARING_PUBLIC_EXPIRE_DATE_DAYS,
                self.sharing_public_expire_date_days,
            )
            .with(
                capability::SHARING_PUBLIC_EXPIRE_DATE_ENFORCED,
                self.sharing_public_expire_date_enforced,
            )
            .with(capability::SHARING_PUBLIC_SEND_MAIL, self.sharing_public_send_mail)
            .with(capability::SHARING_PUBLIC_UPLOAD, self.sharing_public_upload)
            .with(capability::SHARING_PUBLIC_MULTIPLE, self.sharing_public_multiple)
            .with(
                capability::SHARING_PUBLIC_SUPPORTS_UPLOAD_ONLY,
                self.sharing_public_supports_upload_only,
            )
            .with(capability::SHARING_USER_SEND_MAIL, self.sharing_user_send_mail)
            .with(capability::SHARING_RESHARING, self.sharing_resharing)
            .with(capability::SHARING_FEDERATION_OUTGOING, self.sharing_federation_outgoing)
            .with(capability::SHARING_FEDERATION_INCOMING, self.sharing_federation_incoming)
            .with(capability::FILES_BIGFILECHUNKING, self.files_bigfilechunking)
            .with(capability::FILES_UNDELETE, self.files_undelete)
            .with(capability::FILES_VERSIONING, self.files_versioning)
    }

    pub fn from_row(row: &Row) -> Self {
        let int = |column: &str| row.get_i64(column).unwrap_or(0);
        Self {
            id: row.get_i64(schema::ID),
            account_name: row.get_string(capability::ACCOUNT_NAME).unwrap_or_default(),
            version_major: int(capability::VERSION_MAJOR),
            version_minor: int(capability::VERSION_MINOR),
            version_micro: int(capability::VERSION_MICRO),
            version_string: row.get_string(capability::VERSION_STRING),
            version_edition: row.get_string(capability::VERSION_EDITION),
            core_poll_interval: int(capability::CORE_POLL_INTERVAL),
            sharing_api_enabled: int(capability::SHARING_API_ENABLED),
            sharing_public_enabled: int(capability::SHARING_PUBLIC_ENABLED),
            sharing_public_password_enforced: int(capability::SHARING_PUBLIC_PASSWORD_ENFORCED),
            sharing_public_password_enforced_read_only: row
                .get_i64(capability::SHARING_PUBLIC_PASSWORD_ENFORCED_READ_ONLY),
            sharing_public_password_enforced_read_write: row
                .get_i64(capability::SHARING_PUBLIC_PASSWORD_ENFORCED_READ_WRITE),
            sharing_public_password_enforced_upload_only: row
                .get_i64(capability::SHARING_PUBLIC_PASSWORD_ENFORCED_UPLOAD_ONLY),
            sharing_public_expire_date_enabled: int(capability::SHARING_PUBLIC_EXPIRE_DATE_ENABLED),
            sharing_public_expire_date_days: int(capability::SHARING_PUBLIC_EXPIRE_DATE_DAYS),
            sharing_public_expire_date_enforced: int(
                capability::SHARING_PUBLIC_EXPIRE_DATE_ENFORCED,
            ),
            sharing_public_send_mail: int(capability::SHARING_PUBLIC_SEND_MAIL),
            sharing_public_upload: int(capability::SHARING_PUBLIC_UPLOAD),
            sharing_public_multiple: row
                .get_i64(capability::SHARING_PUBLIC_MULTIPLE)
                .unwrap_or(-1),
            sharing_public_supports_upload_only: row
                .get_i64(capability::SHARING_PUBLIC_SUPPORTS_UPLOAD_ONLY)
                .unwrap_or(-1),
            sharing_user_send_mail: int(capability::SHARING_USER_SEND_MAIL),
            sharing_resharing: int(capability::SHARING_RESHARING),
            sharing_federation_outgoing: int(capability::SHARING_FEDERATION_OUTGOING),
            sharing_federation_incoming: int(capability::SHARING_FEDERATION_INCOMING),
            files_bigfilechunking: int(capability::FILES_BIGFILECHUNKING),
            files_undelete: int(capability::FILES_UNDELETE),
            files_versioning: int(capability::FILES_VERSIONING),
        }
    }
}

/// One upload, pending or finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Option<i64>,
    pub local_path: String,
    pub remote_path: String,
    pub account_name: String,
    pub file_size: i64,
    pub status: UploadStatus,
    pub local_behaviour: LocalBehaviour,
    pub upload_time: i64,
    pub force_overwrite: bool,
    pub create_remote_folder: bool,
    /// Completion time, 0 while unfinished
    pub upload_end_timestamp: i64,
    pub last_result: i64,
    pub created_by: UploadCreator,
    pub transfer_id: Option<String>,
}

impl UploadRecord {
    pub fn new(
        account: impl Into<String>,
        local_path: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            account_name: account.into(),
            file_size: 0,
            status: UploadStatus::InProgress,
            local_behaviour: LocalBehaviour::Copy,
            upload_time: 0,
            force_overwrite: false,
            create_remote_folder: false,
            upload_end_timestamp: 0,
            last_result: 0,
            created_by: UploadCreator::User,
            transfer_id: None,
        }
    }

    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(upload::LOCAL_PATH, &self.local_path)
            .with(upload::REMOTE_PATH, &self.remote_path)
            .with(upload::ACCOUNT_NAME, &self.account_name)
            .with(upload::FILE_SIZE, self.file_size)
            .with(upload::STATUS, self.status.code())
            .with(upload::LOCAL_BEHAVIOUR, self.local_behaviour.code())
            .with(upload::UPLOAD_TIME, self.upload_time)
            .with(upload::FORCE_OVERWRITE, self.force_overwrite)
            .with(upload::IS_CREATE_REMOTE_FOLDER, self.create_remote_folder)
            .with(upload::UPLOAD_END_TIMESTAMP, self.upload_end_timestamp)
            .with(upload::LAST_RESULT, self.last_result)
            .with(upload::CREATED_BY, self.created_by.code())
            .with(upload::TRANSFER_ID, self.transfer_id.clone())
    }

    pub fn from_row(row: &Row) -> Result<Self> {
        let code = |column: &str| row.get_i64(column).unwrap_or(0);
        let invalid = |column: &str| {
            Error::ConstraintViolation(format!("Unknown {} code: {}", column, code(column)))
        };
        Ok(Self {
            id: row.get_i64(schema::ID),
            local_path: row.get_string(upload::LOCAL_PATH).unwrap_or_default(),
            remote_path: row.get_string(upload::REMOTE_PATH).unwrap_or_default(),
            account_name: row.get_string(upload::ACCOUNT_NAME).unwrap_or_default(),
            file_size: code(upload::FILE_SIZE),
            status: UploadStatus::from_code(code(upload::STATUS))
                .ok_or_else(|| invalid(upload::STATUS))?,
            local_behaviour: LocalBehaviour::from_code(code(upload::LOCAL_BEHAVIOUR))
                .ok_or_else(|| invalid(upload::LOCAL_BEHAVIOUR))?,
            upload_time: code(upload::UPLOAD_TIME),
            force_overwrite: row.get_bool(upload::FORCE_OVERWRITE),
            create_remote_folder: row.get_bool(upload::IS_CREATE_REMOTE_FOLDER),
            upload_end_timestamp: code(upload::UPLOAD_END_TIMESTAMP),
            last_result: code(upload::LAST_RESULT),
            created_by: UploadCreator::from_code(code(upload::CREATED_BY))
                .ok_or_else(|| invalid(upload::CREATED_BY))?,
            transfer_id: row.get_string(upload::TRANSFER_ID),
        })
    }
}

/// Last synced timestamps of camera-upload media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraUploadCursor {
    pub id: Option<i64>,
    pub pictures_last_sync: i64,
    pub videos_last_sync: i64,
}

impl CameraUploadCursor {
    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(camera::PICTURES_LAST_SYNC, self.pictures_last_sync)
            .with(camera::VIDEOS_LAST_SYNC, self.videos_last_sync)
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get_i64(schema::ID),
            pictures_last_sync: row.get_i64(camera::PICTURES_LAST_SYNC).unwrap_or(0),
            videos_last_sync: row.get_i64(camera::VIDEOS_LAST_SYNC).unwrap_or(0),
        }
    }
}

/// Storage quota of one account, in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub id: Option<i64>,
    pub account_name: String,
    pub free: i64,
    pub used: i64,
    pub total: i64,
    /// Used share of the total, in percent
    pub relative: i64,
}

impl QuotaRecord {
    /// Quota with `relative` derived from used and total
    pub fn new(account: impl Into<String>, free: i64, used: i64, total: i64) -> Self {
        let relative = if total > 0 { used * 100 / total } else { 0 };
        Self {
            id: None,
            account_name: account.into(),
            free,
            used,
            total,
            relative,
        }
    }

    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(quota::ACCOUNT_NAME, &self.account_name)
            .with(quota::FREE, self.free)
            .with(quota::USED, self.used)
            .with(quota::TOTAL, self.total)
            .with(quota::RELATIVE, self.relative)
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get_i64(schema::ID),
            account_name: row.get_string(quota::ACCOUNT_NAME).unwrap_or_default(),
            free: row.get_i64(quota::FREE).unwrap_or(0),
            used: row.get_i64(quota::USED).unwrap_or(0),
            total: row.get_i64(quota::TOTAL).unwrap_or(0),
            relative: row.get_i64(quota::RELATIVE).unwrap_or(0),
        }
    }
}

/// Cached avatar of one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAvatar {
    pub id: Option<i64>,
    pub account_name: String,
    pub cache_key: String,
    pub mime_type: String,
    pub etag: Option<String>,
}

impl UserAvatar {
    pub fn to_values(&self) -> RowValues {
        let mut values = RowValues::new();
        if let Some(id) = self.id {
            values.put(schema::ID, id);
        }
        values
            .with(avatar::ACCOUNT_NAME, &self.account_name)
            .with(avatar::CACHE_KEY, &self.cache_key)
            .with(avatar::MIME_TYPE, &self.mime_type)
            .with(avatar::ETAG, self.etag.clone())
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get_i64(schema::ID),
            account_name: row.get_string(avatar::ACCOUNT_NAME).unwrap_or_default(),
            cache_key: row.get_string(avatar::CACHE_KEY).unwrap_or_default(),
            mime_type: row.get_string(avatar::MIME_TYPE).unwrap_or_default(),
            etag: row.get_string(avatar::ETAG),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;
    use std::sync::Arc;

    fn row_from(values: &RowValues) -> Row {
        let columns: Arc<[String]> = values.iter().map(|(c, _)| c.to_string()).collect();
        Row::new(columns, values.iter().map(|(_, v)| v.clone()).collect())
    }

    #[test]
    fn test_share_type_codes() {
        for share_type in [
            ShareType::User,
            ShareType::Group,
            ShareType::PublicLink,
            ShareType::Federated,
        ] {
            assert_eq!(ShareType::from_code(share_type.code()), Some(share_type));
        }
        assert_eq!(ShareType::PublicLink.code(), 3);
        assert_eq!(ShareType::Federated.code(), 6);
        assert_eq!(ShareType::from_code(2), None);
        assert!(!ShareType::PublicLink.is_sharee());
        assert!(ShareType::Group.is_sharee());
    }

    #[test]
    fn test_folder_name_from_path() {
        let folder = FileRecord::folder("alice@host", "/docs/sub/", 1);
        assert_eq!(folder.name, "sub");
        assert!(folder.is_folder());

        let file = FileRecord::file("alice@host", "/docs/a.txt", 1, "text/plain");
        assert_eq!(file.name, "a.txt");
        assert!(!file.is_folder());
    }

    #[test]
    fn test_file_record_from_row() {
        let mut record = FileRecord::file("alice@host", "/a.txt", 0, "text/plain");
        record.id = Some(5);
        record.keep_in_sync = true;
        record.etag = Some("abc".to_string());

        let parsed = FileRecord::from_row(&row_from(&record.to_values()));
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_upload_record_rejects_unknown_status() {
        let values = UploadRecord::new("alice@host", "/l", "/r").to_values();
        let mut values = values;
        values.put(upload::STATUS, Value::Integer(9));
        assert!(UploadRecord::from_row(&row_from(&values)).is_err());
    }

    #[test]
    fn test_quota_relative() {
        assert_eq!(QuotaRecord::new("a", 750, 250, 1000).relative, 25);
        assert_eq!(QuotaRecord::new("a", 0, 0, 0).relative, 0);
    }
}
