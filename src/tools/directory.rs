//! User directory backing the profile, stats and activity tools.
//!
//! The directory is read-only after load. A fixture of five users is bundled
//! into the binary; deployments can point `users_path` at their own YAML file
//! with the same shape.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::ToolError;

const BUNDLED_USERS: &str = include_str!("../../data/users.yaml");

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub location: String,
    pub joined_date: String,
    pub bio: String,
    pub website: String,
    pub company: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
    pub engagement_rate: f64,
    pub total_likes: u64,
    pub average_comments_per_post: f64,
}

/// One activity entry. Each `type` carries its own extra fields
/// (`engagement`, `attendees`, `version`, ...), kept verbatim in `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub date: String,
    pub action: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    aliases: Vec<String>,
    profile: UserProfile,
    stats: UserStats,
    /// Newest first.
    #[serde(default)]
    activity: Vec<ActivityEntry>,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    users: Vec<UserRecord>,
}

// ─── UserDirectory ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: HashMap<String, UserRecord>,
    /// Lowercased alias → canonical id.
    aliases: HashMap<String, String>,
}

impl UserDirectory {
    /// The fixture compiled into the crate.
    pub fn bundled() -> Result<Self, ToolError> {
        Self::from_yaml_str(BUNDLED_USERS, "bundled fixture")
    }

    /// Load a directory file from disk.
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ToolError::DirectoryLoad {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&raw, &path.display().to_string())
    }

    pub fn from_yaml_str(raw: &str, source_name: &str) -> Result<Self, ToolError> {
        let file: DirectoryFile =
            serde_yaml::from_str(raw).map_err(|e| ToolError::DirectoryLoad {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;

        let mut users = HashMap::new();
        let mut aliases = HashMap::new();
        for record in file.users {
            for alias in &record.aliases {
                aliases.insert(alias.trim().to_lowercase(), record.id.clone());
            }
            users.insert(record.id.clone(), record);
        }

        tracing::debug!(source = source_name, users = users.len(), "user directory loaded");
        Ok(Self { users, aliases })
    }

    /// Map a display name (any case) to its canonical id. Anything else,
    /// including canonical ids, passes through unchanged.
    pub fn resolve<'a>(&'a self, identifier: &'a str) -> &'a str {
        self.aliases
            .get(&identifier.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(identifier)
    }

    pub fn profile(&self, identifier: &str) -> Option<&UserProfile> {
        self.users.get(self.resolve(identifier)).map(|u| &u.profile)
    }

    pub fn stats(&self, identifier: &str) -> Option<&UserStats> {
        self.users.get(self.resolve(identifier)).map(|u| &u.stats)
    }

    /// Activity newest first; empty for unknown users.
    pub fn activity(&self, identifier: &str) -> &[ActivityEntry] {
        self.users
            .get(self.resolve(identifier))
            .map(|u| u.activity.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Sorted canonical ids.
    pub fn user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.users.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
