//! Status, priority, and type enumerations.
//!
//! State transitions:
//! - PENDING -> ASSIGNED -> IN_PROGRESS -> COMPLETED
//! - PENDING -> ASSIGNED/IN_PROGRESS -> PENDING (retry or lease expiry,
//!   until maxRetries)
//! - any non-terminal -> CANCELLED
//! - ASSIGNED/IN_PROGRESS -> FAILED (retry budget exhausted)
//!
//! Caller input for priority and category goes through fixed mapping tables
//! with a defined default, never ad hoc string dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting to be assigned.
    Pending,

    /// Leased to a worker, not yet started.
    Assigned,

    /// Worker reported it started executing.
    InProgress,

    /// Finished successfully. Terminal.
    Completed,

    /// Retry budget exhausted. Terminal.
    Failed,

    /// Cancelled by a producer. Terminal.
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Terminal states are retained for audit and never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// A task holds a lease exactly while it is in one of these states.
    pub fn is_leased(self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }

    /// Wire name (the exact string used in the persisted document).
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Assigned => "ASSIGNED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Map caller input to a priority. Unrecognized or absent input defaults
    /// to MEDIUM.
    pub fn from_input(input: Option<&str>) -> Self {
        match input {
            Some("low") => Priority::Low,
            Some("medium") => Priority::Medium,
            Some("high") => Priority::High,
            Some("urgent") => Priority::Critical,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Development,
    Research,
    Finance,
    Communication,
    Automation,
    Security,
    Creative,
    Operations,
    General,
}

impl TaskType {
    /// Map a caller-supplied category to a type. Unknown or absent input
    /// falls back to GENERAL.
    pub fn from_category(category: Option<&str>) -> Self {
        match category {
            Some("development") => TaskType::Development,
            Some("research") => TaskType::Research,
            Some("finance") => TaskType::Finance,
            Some("communication") => TaskType::Communication,
            Some("automation") => TaskType::Automation,
            Some("security") => TaskType::Security,
            Some("creative") => TaskType::Creative,
            Some("operations") => TaskType::Operations,
            _ => TaskType::General,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Development => "DEVELOPMENT",
            TaskType::Research => "RESEARCH",
            TaskType::Finance => "FINANCE",
            TaskType::Communication => "COMMUNICATION",
            TaskType::Automation => "AUTOMATION",
            TaskType::Security => "SECURITY",
            TaskType::Creative => "CREATIVE",
            TaskType::Operations => "OPERATIONS",
            TaskType::General => "GENERAL",
        }
    }
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::General
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("low"), Priority::Low)]
    #[case(Some("medium"), Priority::Medium)]
    #[case(Some("high"), Priority::High)]
    #[case(Some("urgent"), Priority::Critical)]
    #[case(Some("bogus"), Priority::Medium)]
    #[case(None, Priority::Medium)]
    fn priority_mapping(#[case] input: Option<&str>, #[case] expected: Priority) {
        assert_eq!(Priority::from_input(input), expected);
    }

    #[rstest]
    #[case(Some("development"), TaskType::Development)]
    #[case(Some("research"), TaskType::Research)]
    #[case(Some("finance"), TaskType::Finance)]
    #[case(Some("communication"), TaskType::Communication)]
    #[case(Some("automation"), TaskType::Automation)]
    #[case(Some("security"), TaskType::Security)]
    #[case(Some("creative"), TaskType::Creative)]
    #[case(Some("operations"), TaskType::Operations)]
    #[case(Some("unknown"), TaskType::General)]
    #[case(None, TaskType::General)]
    fn category_mapping(#[case] input: Option<&str>, #[case] expected: TaskType) {
        assert_eq!(TaskType::from_category(input), expected);
    }

    #[test]
    fn wire_names_match_the_document_schema() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&Priority::Critical).unwrap(),
            "\"CRITICAL\""
        );
        assert_eq!(
            serde_json::to_string(&TaskType::General).unwrap(),
            "\"GENERAL\""
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }
}
