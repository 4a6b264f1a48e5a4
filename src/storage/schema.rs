//! Database schema definitions
//!
//! Table and column names are the storage names. Each routed table also
//! carries its projection map: the external column names callers may use,
//! and the storage column each one reads from or writes to.

use crate::address::Resource;
use crate::{Error, Result};

/// Schema version produced by a fresh install and by a complete migration.
pub const CURRENT_VERSION: u32 = 26;

pub const FILES_TABLE: &str = "filelist";
pub const SHARES_TABLE: &str = "shares";
pub const CAPABILITIES_TABLE: &str = "capabilities";
pub const UPLOADS_TABLE: &str = "list_of_uploads";
pub const CAMERA_UPLOADS_SYNC_TABLE: &str = "camera_uploads_sync";
pub const QUOTAS_TABLE: &str = "user_quotas";
pub const AVATARS_TABLE: &str = "user_avatars";

/// Shares table used from v6 until step 26 copies it into [`SHARES_TABLE`]
pub const LEGACY_SHARES_TABLE: &str = "ocshares";
/// Pre-v14 upload bookkeeping, dropped by step 14
pub const LEGACY_INSTANT_UPLOAD_TABLE: &str = "instant_upload";

/// Primary key column of every table
pub const ID: &str = "_id";

/// Content type marking a folder row
pub const DIR_CONTENT_TYPE: &str = "DIR";

pub mod file {
    pub const NAME: &str = "filename";
    pub const PATH: &str = "path";
    pub const PARENT: &str = "parent";
    pub const CREATION: &str = "created";
    pub const MODIFIED: &str = "modified";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const CONTENT_LENGTH: &str = "content_length";
    pub const STORAGE_PATH: &str = "media_path";
    pub const ACCOUNT_OWNER: &str = "file_owner";
    pub const LAST_SYNC_DATE: &str = "last_sync_date";
    pub const KEEP_IN_SYNC: &str = "keep_in_sync";
    pub const LAST_SYNC_DATE_FOR_DATA: &str = "last_sync_date_for_data";
    pub const MODIFIED_AT_LAST_SYNC_FOR_DATA: &str = "modified_at_last_sync_for_data";
    pub const ETAG: &str = "etag";
    pub const TREE_ETAG: &str = "tree_etag";
    pub const SHARED_VIA_LINK: &str = "share_by_link";
    /// Written by v6 clients only; kept in the table, never projected
    pub const PUBLIC_LINK: &str = "public_link";
    pub const PERMISSIONS: &str = "permissions";
    pub const REMOTE_ID: &str = "remote_id";
    pub const UPDATE_THUMBNAIL: &str = "update_thumbnail";
    pub const IS_DOWNLOADING: &str = "is_downloading";
    pub const ETAG_IN_CONFLICT: &str = "etag_in_conflict";
    pub const SHARED_WITH_SHAREE: &str = "shared_via_users";
    pub const PRIVATE_LINK: &str = "private_link";
}

pub mod share {
    pub const FILE_SOURCE: &str = "file_source";
    pub const ITEM_SOURCE: &str = "item_source";
    pub const SHARE_TYPE: &str = "share_type";
    pub const SHARE_WITH: &str = "shate_with";
    pub const PATH: &str = "path";
    pub const PERMISSIONS: &str = "permissions";
    pub const SHARED_DATE: &str = "shared_date";
    pub const EXPIRATION_DATE: &str = "expiration_date";
    pub const TOKEN: &str = "token";
    pub const SHARE_WITH_DISPLAY_NAME: &str = "shared_with_display_name";
    pub const SHARE_WITH_ADDITIONAL_INFO: &str = "share_with_additional_info";
    pub const IS_DIRECTORY: &str = "is_directory";
    pub const USER_ID: &str = "user_id";
    pub const ID_REMOTE_SHARED: &str = "id_remote_shared";
    pub const ACCOUNT_OWNER: &str = "owner_share";
    pub const NAME: &str = "name";
    pub const URL: &str = "url";
}

pub mod capability {
    pub const ACCOUNT_NAME: &str = "account";
    pub const VERSION_MAJOR: &str = "version_mayor";
    pub const VERSION_MINOR: &str = "version_minor";
    pub const VERSION_MICRO: &str = "version_micro";
    pub const VERSION_STRING: &str = "version_string";
    pub const VERSION_EDITION: &str = "version_edition";
    pub const CORE_POLL_INTERVAL: &str = "core_pollinterval";
    pub const SHARING_API_ENABLED: &str = "sharing_api_enabled";
    pub const SHARING_PUBLIC_ENABLED: &str = "sharing_public_enabled";
    pub const SHARING_PUBLIC_PASSWORD_ENFORCED: &str = "sharing_public_password_enforced";
    pub const SHARING_PUBLIC_PASSWORD_ENFORCED_READ_ONLY: &str =
        "sharing_public_password_enforced_read_only";
    pub const SHARING_PUBLIC_PASSWORD_ENFORCED_READ_WRITE: &str =
        "sharing_public_password_enforced_read_write";
    pub const SHARING_PUBLIC_PASSWORD_ENFORCED_UPLOAD_ONLY: &str =
        "sharing_public_password_enforced_public_only";
    pub const SHARING_PUBLIC_EXPIRE_DATE_ENABLED: &str = "sharing_public_expire_date_enabled";
    pub const SHARING_PUBLIC_EXPIRE_DATE_DAYS: &str = "sharing_public_expire_date_days";
    pub const SHARING_PUBLIC_EXPIRE_DATE_ENFORCED: &str = "sharing_public_expire_date_enforced";
    pub const SHARING_PUBLIC_SEND_MAIL: &str = "sharing_public_send_mail";
    pub const SHARING_PUBLIC_UPLOAD: &str = "sharing_public_upload";
    pub const SHARING_PUBLIC_MULTIPLE: &str = "sharing_public_multiple";
    pub const SHARING_PUBLIC_SUPPORTS_UPLOAD_ONLY: &str = "supports_upload_only";
    pub const SHARING_USER_SEND_MAIL: &str = "sharing_user_send_mail";
    pub const SHARING_RESHARING: &str = "sharing_resharing";
    pub const SHARING_FEDERATION_OUTGOING: &str = "sharing_federation_outgoing";
    pub const SHARING_FEDERATION_INCOMING: &str = "sharing_federation_incoming";
    pub const FILES_BIGFILECHUNKING: &str = "files_bigfilechunking";
    pub const FILES_UNDELETE: &str = "files_undelete";
    pub const FILES_VERSIONING: &str = "files_versioning";
}

pub mod upload {
    pub const LOCAL_PATH: &str = "local_path";
    pub const REMOTE_PATH: &str = "remote_path";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const FILE_SIZE: &str = "file_size";
    pub const STATUS: &str = "status";
    pub const LOCAL_BEHAVIOUR: &str = "local_behaviour";
    pub const UPLOAD_TIME: &str = "upload_time";
    pub const FORCE_OVERWRITE: &str = "force_overwrite";
    pub const IS_CREATE_REMOTE_FOLDER: &str = "is_create_remote_folder";
    pub const UPLOAD_END_TIMESTAMP: &str = "upload_end_timestamp";
    pub const LAST_RESULT: &str = "last_result";
    pub const CREATED_BY: &str = "created_by";
    pub const TRANSFER_ID: &str = "transfer_id";
}

pub mod camera {
    pub const PICTURES_LAST_SYNC: &str = "pictures_last_sync_date";
    pub const VIDEOS_LAST_SYNC: &str = "videos_last_sync_date";
}

pub mod quota {
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const FREE: &str = "free";
    pub const RELATIVE: &str = "relative";
    pub const TOTAL: &str = "total";
    pub const USED: &str = "used";
}

pub mod avatar {
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const CACHE_KEY: &str = "cache_key";
    pub const MIME_TYPE: &str = "mime_type";
    pub const ETAG: &str = "etag";
}

/// A routed table: storage columns, external aliases and default order.
#[derive(Debug)]
pub struct TableDef {
    pub name: &'static str,
    /// Projected storage columns, in output order
    pub columns: &'static [&'static str],
    /// External name -> storage column, beyond the identity mapping
    pub aliases: &'static [(&'static str, &'static str)],
    pub default_sort: &'static str,
}

impl TableDef {
    /// Map an external column name to its storage column
    pub fn resolve(&self, external: &str) -> Result<&'static str> {
        if let Some(column) = self.columns.iter().find(|c| **c == external) {
            return Ok(column);
        }
        self.aliases
            .iter()
            .find(|(alias, _)| *alias == external)
            .map(|(_, column)| *column)
            .ok_or_else(|| Error::InvalidColumn {
                table: self.name,
                column: external.to_string(),
            })
    }

    /// Every projected column, for queries without an explicit projection
    pub fn default_projection(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.to_string()).collect()
    }
}

pub static FILES: TableDef = TableDef {
    name: FILES_TABLE,
    columns: &[
        ID,
        file::NAME,
        file::PATH,
        file::PARENT,
        file::CREATION,
        file::MODIFIED,
        file::CONTENT_TYPE,
        file::CONTENT_LENGTH,
        file::STORAGE_PATH,
        file::ACCOUNT_OWNER,
        file::LAST_SYNC_DATE,
        file::KEEP_IN_SYNC,
        file::LAST_SYNC_DATE_FOR_DATA,
        file::MODIFIED_AT_LAST_SYNC_FOR_DATA,
        file::ETAG,
        file::TREE_ETAG,
        file::SHARED_VIA_LINK,
        file::PERMISSIONS,
        file::REMOTE_ID,
        file::UPDATE_THUMBNAIL,
        file::IS_DOWNLOADING,
        file::ETAG_IN_CONFLICT,
        file::SHARED_WITH_SHAREE,
        file::PRIVATE_LINK,
    ],
    aliases: &[
        ("name", file::NAME),
        ("storage_path", file::STORAGE_PATH),
        ("account_owner", file::ACCOUNT_OWNER),
        ("shared_via_link", file::SHARED_VIA_LINK),
        ("shared_with_sharee", file::SHARED_WITH_SHAREE),
    ],
    // folders first, then by name
    default_sort: "CASE content_type WHEN 'DIR' THEN 0 ELSE 1 END, filename COLLATE NOCASE ASC",
};

pub static SHARES: TableDef = TableDef {
    name: SHARES_TABLE,
    columns: &[
        ID,
        share::FILE_SOURCE,
        share::ITEM_SOURCE,
        share::SHARE_TYPE,
        share::SHARE_WITH,
        share::PATH,
        share::PERMISSIONS,
        share::SHARED_DATE,
        share::EXPIRATION_DATE,
        share::TOKEN,
        share::SHARE_WITH_DISPLAY_NAME,
        share::SHARE_WITH_ADDITIONAL_INFO,
        share::IS_DIRECTORY,
        share::USER_ID,
        share::ID_REMOTE_SHARED,
        share::ACCOUNT_OWNER,
        share::NAME,
        share::URL,
    ],
    aliases: &[
        ("share_with", share::SHARE_WITH),
        ("account_owner", share::ACCOUNT_OWNER),
    ],
    default_sort: "file_source ASC",
};

pub static CAPABILITIES: TableDef = TableDef {
    name: CAPABILITIES_TABLE,
    columns: &[
        ID,
        capability::ACCOUNT_NAME,
        capability::VERSION_MAJOR,
        capability::VERSION_MINOR,
        capability::VERSION_MICRO,
        capability::VERSION_STRING,
        capability::VERSION_EDITION,
        capability::CORE_POLL_INTERVAL,
        capability::SHARING_API_ENABLED,
        capability::SHARING_PUBLIC_ENABLED,
        capability::SHARING_PUBLIC_PASSWORD_ENFORCED,
        capability::SHARING_PUBLIC_PASSWORD_ENFORCED_READ_ONLY,
        capability::SHARING_PUBLIC_PASSWORD_ENFORCED_READ_WRITE,
        capability::SHARING_PUBLIC_PASSWORD_ENFORCED_UPLOAD_ONLY,
        capability::SHARING_PUBLIC_EXPIRE_DATE_ENABLED,
        capability::SHARING_PUBLIC_EXPIRE_DATE_DAYS,
        capability::SHARING_PUBLIC_EXPIRE_DATE_ENFORCED,
        capability::SHARING_PUBLIC_SEND_MAIL,
        capability::SHARING_PUBLIC_UPLOAD,
        capability::SHARING_PUBLIC_MULTIPLE,
        capability::SHARING_PUBLIC_SUPPORTS_UPLOAD_ONLY,
        capability::SHARING_USER_SEND_MAIL,
        capability::SHARING_RESHARING,
        capability::SHARING_FEDERATION_OUTGOING,
        capability::SHARING_FEDERATION_INCOMING,
        capability::FILES_BIGFILECHUNKING,
        capability::FILES_UNDELETE,
        capability::FILES_VERSIONING,
    ],
    aliases: &[
        ("account_name", capability::ACCOUNT_NAME),
        ("version_major", capability::VERSION_MAJOR),
    ],
    default_sort: "account COLLATE NOCASE ASC",
};

pub static UPLOADS: TableDef = TableDef {
    name: UPLOADS_TABLE,
    columns: &[
        ID,
        upload::LOCAL_PATH,
        upload::REMOTE_PATH,
        upload::ACCOUNT_NAME,
        upload::FILE_SIZE,
        upload::STATUS,
        upload::LOCAL_BEHAVIOUR,
        upload::UPLOAD_TIME,
        upload::FORCE_OVERWRITE,
        upload::IS_CREATE_REMOTE_FOLDER,
        upload::UPLOAD_END_TIMESTAMP,
        upload::LAST_RESULT,
        upload::CREATED_BY,
        upload::TRANSFER_ID,
    ],
    aliases: &[],
    default_sort: "_id DESC",
};

pub static CAMERA_UPLOADS_SYNC: TableDef = TableDef {
    name: CAMERA_UPLOADS_SYNC_TABLE,
    columns: &[ID, camera::PICTURES_LAST_SYNC, camera::VIDEOS_LAST_SYNC],
    aliases: &[],
    default_sort: "_id ASC",
};

pub static QUOTAS: TableDef = TableDef {
    name: QUOTAS_TABLE,
    columns: &[
        ID,
        quota::ACCOUNT_NAME,
        quota::FREE,
        quota::RELATIVE,
        quota::TOTAL,
        quota::USED,
    ],
    aliases: &[],
    default_sort: "account_name COLLATE NOCASE ASC",
};

/// Table addressed by a resource kind
pub fn table_for(resource: &Resource) -> &'static TableDef {
    match resource {
        Resource::Root | Resource::File(_) | Resource::Directory(_) => &FILES,
        Resource::Shares(_) => &SHARES,
        Resource::Capabilities(_) => &CAPABILITIES,
        Resource::Uploads(_) => &UPLOADS,
        Resource::CameraUploadsSync(_) => &CAMERA_UPLOADS_SYNC,
        Resource::Quotas(_) => &QUOTAS,
    }
}

/// SQL to create the files table at the current version
pub const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE filelist (
    _id INTEGER PRIMARY KEY,
    filename TEXT,
    path TEXT,
    parent INTEGER,
    created INTEGER,
    modified INTEGER,
    content_type TEXT,
    content_length INTEGER,
    media_path TEXT,
    file_owner TEXT,
    last_sync_date INTEGER,
    keep_in_sync INTEGER DEFAULT 0,
    last_sync_date_for_data INTEGER DEFAULT 0,
    modified_at_last_sync_for_data INTEGER DEFAULT 0,
    etag TEXT DEFAULT NULL,
    tree_etag TEXT DEFAULT NULL,
    share_by_link INTEGER DEFAULT 0,
    public_link TEXT DEFAULT NULL,
    permissions TEXT DEFAULT NULL,
    remote_id TEXT DEFAULT NULL,
    update_thumbnail INTEGER DEFAULT 0,
    is_downloading INTEGER DEFAULT 0,
    etag_in_conflict TEXT DEFAULT NULL,
    shared_via_users INTEGER DEFAULT 0,
    private_link TEXT DEFAULT NULL
)
"#;

/// SQL to create the shares table (fresh installs and step 26)
pub const CREATE_SHARES_TABLE: &str = r#"
CREATE TABLE shares (
    _id INTEGER PRIMARY KEY,
    file_source INTEGER,
    item_source INTEGER,
    share_type INTEGER,
    shate_with TEXT,
    path TEXT,
    permissions INTEGER,
    shared_date INTEGER,
    expiration_date INTEGER,
    token TEXT,
    shared_with_display_name TEXT,
    share_with_additional_info TEXT,
    is_directory INTEGER,
    user_id INTEGER,
    id_remote_shared INTEGER,
    owner_share TEXT,
    name TEXT,
    url TEXT
)
"#;

/// SQL to create the capabilities table at the current version
pub const CREATE_CAPABILITIES_TABLE: &str = r#"
CREATE TABLE capabilities (
    _id INTEGER PRIMARY KEY,
    account TEXT,
    version_mayor INTEGER,
    version_minor INTEGER,
    version_micro INTEGER,
    version_string TEXT,
    version_edition TEXT,
    core_pollinterval INTEGER,
    sharing_api_enabled INTEGER,
    sharing_public_enabled INTEGER,
    sharing_public_password_enforced INTEGER,
    sharing_public_expire_date_enabled INTEGER,
    sharing_public_expire_date_days INTEGER,
    sharing_public_expire_date_enforced INTEGER,
    sharing_public_send_mail INTEGER,
    sharing_public_upload INTEGER,
    sharing_user_send_mail INTEGER,
    sharing_resharing INTEGER,
    sharing_federation_outgoing INTEGER,
    sharing_federation_incoming INTEGER,
    files_bigfilechunking INTEGER,
    files_undelete INTEGER,
    files_versioning INTEGER,
    sharing_public_multiple INTEGER DEFAULT -1,
    supports_upload_only INTEGER DEFAULT -1,
    sharing_public_password_enforced_read_only INTEGER DEFAULT NULL,
    sharing_public_password_enforced_read_write INTEGER DEFAULT NULL,
    sharing_public_password_enforced_public_only INTEGER DEFAULT NULL
)
"#;

/// SQL to create the uploads table at the current version
pub const CREATE_UPLOADS_TABLE: &str = r#"
CREATE TABLE list_of_uploads (
    _id INTEGER PRIMARY KEY,
    local_path TEXT,
    remote_path TEXT,
    account_name TEXT,
    file_size LONG,
    status INTEGER,
    local_behaviour INTEGER,
    upload_time INTEGER,
    force_overwrite INTEGER,
    is_create_remote_folder INTEGER,
    upload_end_timestamp INTEGER,
    last_result INTEGER,
    created_by INTEGER,
    transfer_id TEXT DEFAULT NULL
)
"#;

/// SQL to create the user avatars table
pub const CREATE_AVATARS_TABLE: &str = r#"
CREATE TABLE user_avatars (
    _id INTEGER PRIMARY KEY,
    account_name TEXT,
    cache_key TEXT,
    mime_type TEXT,
    etag TEXT
)
"#;

/// SQL to create the user quotas table
pub const CREATE_QUOTAS_TABLE: &str = r#"
CREATE TABLE user_quotas (
    _id INTEGER PRIMARY KEY,
    account_name TEXT,
    free LONG,
    relative LONG,
    total LONG,
    used LONG
)
"#;

/// SQL to create the camera uploads cursor table
pub const CREATE_CAMERA_UPLOADS_SYNC_TABLE: &str = r#"
CREATE TABLE camera_uploads_sync (
    _id INTEGER PRIMARY KEY,
    pictures_last_sync_date INTEGER,
    videos_last_sync_date INTEGER
)
"#;

/// Lookup indexes, ensured after every open whatever path built the schema
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_filelist_path_owner ON filelist(path, file_owner)",
    "CREATE INDEX IF NOT EXISTS idx_filelist_parent ON filelist(parent)",
    "CREATE INDEX IF NOT EXISTS idx_uploads_status ON list_of_uploads(status)",
];

/// Every table at the current version, for fresh installs
pub fn current_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_FILES_TABLE,
        CREATE_SHARES_TABLE,
        CREATE_CAPABILITIES_TABLE,
        CREATE_UPLOADS_TABLE,
        CREATE_AVATARS_TABLE,
        CREATE_QUOTAS_TABLE,
        CREATE_CAMERA_UPLOADS_SYNC_TABLE,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(FILES.resolve("storage_path").unwrap(), "media_path");
        assert_eq!(FILES.resolve("media_path").unwrap(), "media_path");
        assert_eq!(SHARES.resolve("share_with").unwrap(), "shate_with");
        assert!(matches!(
            FILES.resolve("public_link"),
            Err(Error::InvalidColumn { .. })
        ));
        assert!(FILES.resolve("filename; DROP TABLE filelist").is_err());
    }

    #[test]
    fn test_table_for_resource() {
        assert_eq!(table_for(&Resource::Directory(Some(1))).name, FILES_TABLE);
        assert_eq!(table_for(&Resource::Uploads(None)).name, UPLOADS_TABLE);
        assert_eq!(table_for(&Resource::Quotas(Some(2))).name, QUOTAS_TABLE);
    }
}
