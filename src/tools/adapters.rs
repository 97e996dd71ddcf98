//! Typed adapters for the three user-data tools.
//!
//! Each adapter takes a user identifier (canonical id or display name) and
//! returns a [`ToolOutput`]. Unknown users produce the not-found variant, which
//! the agent loop forwards to the model like any other result.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::directory::{ActivityEntry, UserDirectory, UserProfile, UserStats};
use super::errors::ToolError;
use crate::inference::types::ToolDefinition;

/// Activity entries returned when the model omits `limit`.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 5;

// ─── ToolKind ────────────────────────────────────────────────────────────────

/// The callable tools offered to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    UserProfile,
    UserStats,
    RecentActivity,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::UserProfile,
        ToolKind::UserStats,
        ToolKind::RecentActivity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::UserProfile => "get_user_profile",
            ToolKind::UserStats => "get_user_stats",
            ToolKind::RecentActivity => "get_recent_activity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name.trim())
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::UserProfile => {
                "Get user profile information including name, email, location, and join date"
            }
            ToolKind::UserStats => {
                "Get user statistics like posts count, followers, and engagement rate"
            }
            ToolKind::RecentActivity => "Get recent activity of a user",
        }
    }

    /// JSON Schema for the tool's arguments.
    pub fn parameters(self) -> Value {
        let user_id = json!({
            "type": "string",
            "description": "User id (e.g. user_001) or first name (e.g. ana)"
        });
        match self {
            ToolKind::UserProfile | ToolKind::UserStats => json!({
                "type": "object",
                "properties": { "user_id": user_id },
                "required": ["user_id"]
            }),
            ToolKind::RecentActivity => json!({
                "type": "object",
                "properties": {
                    "user_id": user_id,
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of entries, newest first",
                        "default": DEFAULT_ACTIVITY_LIMIT,
                        "minimum": 0
                    }
                },
                "required": ["user_id"]
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

/// Definitions for every tool, in a stable order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.into_iter().map(ToolKind::definition).collect()
}

// ─── ToolOutput ──────────────────────────────────────────────────────────────

/// Result of one adapter call, serialized verbatim into the tool-result message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Profile(UserProfile),
    Stats(UserStats),
    Activity(Vec<ActivityEntry>),
    NotFound { error: String },
}

impl ToolOutput {
    /// Whether the lookup found nothing. An empty activity list counts.
    pub fn is_not_found(&self) -> bool {
        match self {
            ToolOutput::NotFound { .. } => true,
            ToolOutput::Activity(entries) => entries.is_empty(),
            _ => false,
        }
    }
}

// ─── Adapters ────────────────────────────────────────────────────────────────

pub fn get_user_profile(directory: &UserDirectory, user_id: &str) -> ToolOutput {
    match directory.profile(user_id) {
        Some(profile) => ToolOutput::Profile(profile.clone()),
        None => ToolOutput::NotFound {
            error: format!("User not found: {user_id}"),
        },
    }
}

pub fn get_user_stats(directory: &UserDirectory, user_id: &str) -> ToolOutput {
    match directory.stats(user_id) {
        Some(stats) => ToolOutput::Stats(stats.clone()),
        None => ToolOutput::NotFound {
            error: format!("Stats not found: {user_id}"),
        },
    }
}

/// Up to `limit` entries, newest first. Unknown users yield an empty list.
pub fn get_recent_activity(directory: &UserDirectory, user_id: &str, limit: usize) -> ToolOutput {
    ToolOutput::Activity(directory.activity(user_id).iter().take(limit).cloned().collect())
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Dispatches model-requested tool calls to the adapters.
#[derive(Debug, Clone)]
pub struct ToolAdapters {
    directory: Arc<UserDirectory>,
}

impl ToolAdapters {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Validate arguments and run the named tool.
    pub fn execute(&self, tool_name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        let kind = ToolKind::from_name(tool_name).ok_or_else(|| ToolError::UnknownTool {
            name: tool_name.to_string(),
        })?;

        let args = arguments.as_object().ok_or_else(|| ToolError::InvalidArguments {
            tool: kind.name().to_string(),
            reason: "arguments must be a JSON object".to_string(),
        })?;

        let user_id = match args.get("user_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
            Some(Value::String(_)) => {
                return Err(ToolError::InvalidArguments {
                    tool: kind.name().to_string(),
                    reason: "'user_id' must not be empty".to_string(),
                })
            }
            Some(_) => {
                return Err(ToolError::InvalidArguments {
                    tool: kind.name().to_string(),
                    reason: "'user_id' must be a string".to_string(),
                })
            }
            None => {
                return Err(ToolError::InvalidArguments {
                    tool: kind.name().to_string(),
                    reason: "missing required field: 'user_id'".to_string(),
                })
            }
        };

        Ok(match kind {
            ToolKind::UserProfile => get_user_profile(&self.directory, user_id),
            ToolKind::UserStats => get_user_stats(&self.directory, user_id),
            ToolKind::RecentActivity => {
                let limit = parse_limit(args.get("limit")).ok_or_else(|| {
                    ToolError::InvalidArguments {
                        tool: kind.name().to_string(),
                        reason: "'limit' must be a non-negative integer".to_string(),
                    }
                })?;
                get_recent_activity(&self.directory, user_id, limit)
            }
        })
    }
}

/// Absent or null means the default. Integral floats and numeric strings are
/// accepted since smaller models emit both.
fn parse_limit(value: Option<&Value>) -> Option<usize> {
    match value {
        None | Some(Value::Null) => Some(DEFAULT_ACTIVITY_LIMIT),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(|n| n as usize),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn adapters() -> ToolAdapters {
        ToolAdapters::new(Arc::new(UserDirectory::bundled().unwrap()))
    }

    #[test]
    fn test_tool_kind_names_roundtrip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("delete_user"), None);
    }

    #[test]
    fn test_definitions_in_openai_shape() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), 3);
        let json = serde_json::to_value(&defs[2]).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_recent_activity");
        assert_eq!(json["function"]["parameters"]["properties"]["limit"]["default"], 5);
        assert_eq!(json["function"]["parameters"]["required"][0], "user_id");
    }

    #[test]
    fn test_profile_by_display_name() {
        let out = adapters()
            .execute("get_user_profile", &json!({"user_id": "ana"}))
            .unwrap();
        let ToolOutput::Profile(profile) = &out else {
            panic!("expected profile, got {out:?}");
        };
        assert_eq!(profile.name, "Ana Müller");
        assert_eq!(profile.company, "TechCorp Berlin");
        assert!(!out.is_not_found());
    }

    #[test]
    fn test_profile_same_record_for_alias_case_and_canonical_id() {
        let tools = adapters();
        let outputs: Vec<ToolOutput> = ["ana", "Ana", "user_001"]
            .into_iter()
            .map(|id| tools.execute("get_user_profile", &json!({ "user_id": id })).unwrap())
            .collect();
        assert!(matches!(outputs[0], ToolOutput::Profile(_)));
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0], outputs[2]);
    }

    #[test]
    fn test_profile_not_found_sentinel() {
        let out = adapters()
            .execute("get_user_profile", &json!({"user_id": "user_999"}))
            .unwrap();
        assert!(out.is_not_found());
        assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"error":"User not found: user_999"}"#);
    }

    #[test]
    fn test_stats_not_found_sentinel() {
        let out = adapters()
            .execute("get_user_stats", &json!({"user_id": "bran"}))
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::NotFound {
                error: "Stats not found: bran".into()
            }
        );
    }

    #[test]
    fn test_stats_serialization() {
        let out = adapters()
            .execute("get_user_stats", &json!({"user_id": "Sarah"}))
            .unwrap();
        let json: Value = serde_json::to_value(&out).unwrap();
        assert_eq!(json["followers"], 12500);
        assert_eq!(json["posts"], 287);
    }

    #[test]
    fn test_activity_default_limit_and_shape() {
        let out = adapters()
            .execute("get_recent_activity", &json!({"user_id": "james"}))
            .unwrap();
        let json: Value = serde_json::to_value(&out).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), DEFAULT_ACTIVITY_LIMIT);
        assert_eq!(entries[0]["type"], "technical");
        assert_eq!(entries[0]["systems"], 15);
        assert_eq!(entries[2]["pr_merged"], 4);
    }

    #[test]
    fn test_activity_limit_variants() {
        let a = adapters();
        let count = |args: Value| match a.execute("get_recent_activity", &args).unwrap() {
            ToolOutput::Activity(entries) => entries.len(),
            other => panic!("expected activity, got {other:?}"),
        };
        assert_eq!(count(json!({"user_id": "priya", "limit": 2})), 2);
        assert_eq!(count(json!({"user_id": "priya", "limit": 3.0})), 3);
        assert_eq!(count(json!({"user_id": "priya", "limit": "1"})), 1);
        assert_eq!(count(json!({"user_id": "priya", "limit": null})), 5);
        assert_eq!(count(json!({"user_id": "priya", "limit": 50})), 5);
        assert_eq!(count(json!({"user_id": "priya", "limit": 0})), 0);
    }

    #[test]
    fn test_activity_unknown_user_is_empty_list() {
        let out = adapters()
            .execute("get_recent_activity", &json!({"user_id": "hodor"}))
            .unwrap();
        assert!(out.is_not_found());
        assert_eq!(serde_json::to_string(&out).unwrap(), "[]");
    }

    #[test]
    fn test_unknown_tool() {
        let err = adapters()
            .execute("delete_user", &json!({"user_id": "ana"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[test]
    fn test_invalid_arguments() {
        let a = adapters();
        for args in [
            json!({}),
            json!({"user_id": 7}),
            json!({"user_id": "  "}),
            json!("ana"),
        ] {
            let err = a.execute("get_user_profile", &args).unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments { .. }), "{args}");
        }
        let err = a
            .execute("get_recent_activity", &json!({"user_id": "ana", "limit": -1}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
