use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScrapingError;

// --- Protocol version ---

/// Software version carried on every synapse. Validators may omit any part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major_version: Option<u32>,
    pub minor_version: Option<u32>,
    pub patch_version: Option<u32>,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major_version: Some(major),
            minor_version: Some(minor),
            patch_version: Some(patch),
        }
    }

    /// The version this build speaks.
    pub fn current() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION")).unwrap_or_default()
    }

    /// Parse `"1.2.3"`. Missing trailing parts are left empty.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map(str::parse).transpose().ok()?;
        let patch = parts.next().map(str::parse).transpose().ok()?;
        Some(Self {
            major_version: Some(major),
            minor_version: minor,
            patch_version: patch,
        })
    }

    fn triple(&self) -> (u32, u32, u32) {
        (
            self.major_version.unwrap_or(0),
            self.minor_version.unwrap_or(0),
            self.patch_version.unwrap_or(0),
        )
    }

    /// Major and minor must match; patch releases interoperate.
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major_version == other.major_version && self.minor_version == other.minor_version
    }

    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.triple() > other.triple()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn part(p: Option<u32>) -> String {
            p.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
        }
        write!(
            f,
            "{}.{}.{}",
            part(self.major_version),
            part(self.minor_version),
            part(self.patch_version)
        )
    }
}

/// Whether a validator speaking `remote` can be served by this build.
pub fn check_version(remote: &Version) -> bool {
    Version::current().is_compatible_with(remote)
}

// --- Request kinds ---

/// The whitelisted scraping targets. Each maps to one synapse type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Twitter,
    Reddit,
}

impl QueryType {
    pub const ALL: [QueryType; 2] = [QueryType::Twitter, QueryType::Reddit];

    /// Request-kind name used for routing and bus topics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryType::Twitter => "twitter-scrape",
            QueryType::Reddit => "reddit-scrape",
        }
    }

    /// Synapse class name used as the axon route.
    pub fn synapse_name(&self) -> &'static str {
        match self {
            QueryType::Twitter => "TwitterScrap",
            QueryType::Reddit => "RedditScrap",
        }
    }

    /// Short name used for buckets and file prefixes.
    pub fn source_type(&self) -> &'static str {
        match self {
            QueryType::Twitter => "twitter",
            QueryType::Reddit => "reddit",
        }
    }

    pub fn from_synapse_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.synapse_name() == name)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

impl FromStr for QueryType {
    type Err = ScrapingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "twitter-scrape" | "twitterscrap" => Ok(QueryType::Twitter),
            "reddit" | "reddit-scrape" | "redditscrap" => Ok(QueryType::Reddit),
            other => Err(ScrapingError::UnknownKind(other.to_string())),
        }
    }
}

// --- Request payload ---

/// Validator-supplied search terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapInput {
    #[serde(default)]
    pub search_key: Vec<String>,
}

impl ScrapInput {
    pub fn is_empty(&self) -> bool {
        self.search_key.iter().all(|k| k.trim().is_empty())
    }
}
