//! Resource addresses - the only way callers name rows and collections
//!
//! Format: `content://<authority>/<kind>[/<id>]`
//!
//! Examples:
//! - `content://org.syncstore/` (root file collection)
//! - `content://org.syncstore/file/42`
//! - `content://org.syncstore/dir/7` (recursive-delete semantics)
//! - `content://org.syncstore/uploads`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheme prefix for every address. Parsing also accepts addresses without it.
pub const SCHEME: &str = "content://";

/// Kind of resource an address points at, carrying its optional row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// The whole file tree of every account
    Root,
    /// One file row (id may be absent on insert)
    File(Option<i64>),
    /// A folder: queries list its children, deletes are recursive
    Directory(Option<i64>),
    Shares(Option<i64>),
    Capabilities(Option<i64>),
    Uploads(Option<i64>),
    CameraUploadsSync(Option<i64>),
    Quotas(Option<i64>),
}

impl Resource {
    /// Path segment naming this kind, `None` for the root collection
    pub fn segment(&self) -> Option<&'static str> {
        match self {
            Resource::Root => None,
            Resource::File(_) => Some("file"),
            Resource::Directory(_) => Some("dir"),
            Resource::Shares(_) => Some("shares"),
            Resource::Capabilities(_) => Some("capabilities"),
            Resource::Uploads(_) => Some("uploads"),
            Resource::CameraUploadsSync(_) => Some("cameraUploadsSync"),
            Resource::Quotas(_) => Some("quotas"),
        }
    }

    pub fn id(&self) -> Option<i64> {
        match *self {
            Resource::Root => None,
            Resource::File(id)
            | Resource::Directory(id)
            | Resource::Shares(id)
            | Resource::Capabilities(id)
            | Resource::Uploads(id)
            | Resource::CameraUploadsSync(id)
            | Resource::Quotas(id) => id,
        }
    }

    /// Same kind, pointing at row `id`
    pub fn with_id(self, id: i64) -> Self {
        match self {
            Resource::Root | Resource::File(_) => Resource::File(Some(id)),
            Resource::Directory(_) => Resource::Directory(Some(id)),
            Resource::Shares(_) => Resource::Shares(Some(id)),
            Resource::Capabilities(_) => Resource::Capabilities(Some(id)),
            Resource::Uploads(_) => Resource::Uploads(Some(id)),
            Resource::CameraUploadsSync(_) => Resource::CameraUploadsSync(Some(id)),
            Resource::Quotas(_) => Resource::Quotas(Some(id)),
        }
    }

    /// The collection whose listing changes when this resource changes.
    ///
    /// Files and directories belong to the root file collection; every other
    /// kind belongs to its own id-less collection.
    pub fn collection(&self) -> Resource {
        match self {
            Resource::Root | Resource::File(_) | Resource::Directory(_) => Resource::Root,
            Resource::Shares(_) => Resource::Shares(None),
            Resource::Capabilities(_) => Resource::Capabilities(None),
            Resource::Uploads(_) => Resource::Uploads(None),
            Resource::CameraUploadsSync(_) => Resource::CameraUploadsSync(None),
            Resource::Quotas(_) => Resource::Quotas(None),
        }
    }

    /// Whether `other` is this resource or lives underneath it.
    pub fn covers(&self, other: &Resource) -> bool {
        if self == other {
            return true;
        }
        match (self.id(), other.id()) {
            (None, Some(_)) => other.collection() == *self || self.segment() == other.segment(),
            (None, None) => *self == Resource::Root && other.collection() == Resource::Root,
            _ => false,
        }
    }

    fn from_segments(kind: &str, id: Option<i64>) -> Option<Self> {
        let resource = match kind {
            "file" => Resource::File(id),
            "dir" => Resource::Directory(id),
            "shares" => Resource::Shares(id),
            "capabilities" => Resource::Capabilities(id),
            "uploads" => Resource::Uploads(id),
            "cameraUploadsSync" => Resource::CameraUploadsSync(id),
            "quotas" => Resource::Quotas(id),
            _ => return None,
        };
        Some(resource)
    }
}

/// A fully qualified resource address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// Authority token, fixed per installation
    pub authority: String,
    pub resource: Resource,
}

impl ResourceAddress {
    pub fn new(authority: impl Into<String>, resource: Resource) -> Self {
        Self {
            authority: authority.into(),
            resource,
        }
    }

    /// Parse an address with any authority.
    ///
    /// Expected format: `[content://]<authority>[/<kind>[/<id>]][/]`
    pub fn parse(address: &str) -> Result<Self> {
        let unknown = || Error::UnknownResource(address.to_string());

        let rest = address.strip_prefix(SCHEME).unwrap_or(address);
        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(unknown());
        }

        let path = path.strip_suffix('/').unwrap_or(path);
        if path.is_empty() {
            return Ok(Self::new(authority, Resource::Root));
        }

        let mut segments = path.split('/');
        let kind = segments.next().ok_or_else(unknown)?;
        let id = match segments.next() {
            None => None,
            Some(raw) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => {
                Some(raw.parse::<i64>().map_err(|_| unknown())?)
            }
            Some(_) => return Err(unknown()),
        };
        if segments.next().is_some() {
            return Err(unknown());
        }

        let resource = Resource::from_segments(kind, id).ok_or_else(unknown)?;
        Ok(Self::new(authority, resource))
    }

    /// Address of the row `id` of the same kind
    pub fn with_id(&self, id: i64) -> Self {
        Self::new(self.authority.clone(), self.resource.with_id(id))
    }

    /// Address of the collection this resource is listed in
    pub fn collection(&self) -> Self {
        Self::new(self.authority.clone(), self.resource.collection())
    }

    /// Convert to address string
    pub fn to_address_string(&self) -> String {
        let mut out = format!("{}{}", SCHEME, self.authority);
        match self.resource.segment() {
            None => out.push('/'),
            Some(segment) => {
                out.push('/');
                out.push_str(segment);
                if let Some(id) = self.resource.id() {
                    out.push('/');
                    out.push_str(&id.to_string());
                }
            }
        }
        out
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address_string())
    }
}

impl FromStr for ResourceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_address_string())
    }
}

impl<'de> Deserialize<'de> for ResourceAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ResourceAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Classifies address strings for one installation's authority.
#[derive(Debug, Clone)]
pub struct Router {
    authority: String,
}

impl Router {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Classify an address; foreign authorities are unknown resources.
    pub fn route(&self, address: &str) -> Result<ResourceAddress> {
        let parsed = ResourceAddress::parse(address)?;
        if parsed.authority != self.authority {
            return Err(Error::UnknownResource(address.to_string()));
        }
        Ok(parsed)
    }

    /// Build the address of `resource` under this authority
    pub fn address(&self, resource: Resource) -> ResourceAddress {
        ResourceAddress::new(self.authority.clone(), resource)
    }
}
