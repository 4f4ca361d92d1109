use crate::form::FormSnapshot;
use crate::util::{priority_tone, status_tone, Tone};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type TaskId = u64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub category_name: Option<String>,
}

/// Body sent when creating or updating a task.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub due_date: Option<String>,
    /// `null` detaches the task from its category on update.
    pub category_id: Option<u64>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaskStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub completed_tasks: usize,
    pub overdue_tasks: usize,
    #[serde(default)]
    pub priority_distribution: BTreeMap<String, usize>,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Priority::ALL.into_iter().find(|p| p.as_str() == raw)
    }

    pub fn tone(self) -> Tone {
        priority_tone(self.as_str())
    }
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Pending,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
            Status::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Status::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    pub fn tone(self) -> Tone {
        status_tone(self.as_str())
    }
}

impl Task {
    /// Server dates come as ISO timestamps or plain days; only the day matters here.
    pub fn due_day(&self) -> Option<NaiveDate> {
        let raw = self.due_date.as_deref()?;
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    pub fn form_values(&self) -> FormSnapshot {
        let mut values = FormSnapshot::new();
        values.insert("title".into(), self.title.clone());
        values.insert(
            "description".into(),
            self.description.clone().unwrap_or_default(),
        );
        values.insert("priority".into(), self.priority.as_str().into());
        values.insert("status".into(), self.status.as_str().into());
        values.insert(
            "due_date".into(),
            self.due_day()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        );
        values.insert(
            "category_id".into(),
            self.category_id.map(|id| id.to_string()).unwrap_or_default(),
        );
        values
    }
}

impl TaskDraft {
    /// Builds a request body out of task form values. Unknown select values
    /// fall back to the server defaults.
    pub fn from_values(values: &FormSnapshot) -> Self {
        let due = field(values, "due_date");
        TaskDraft {
            title: field(values, "title").to_string(),
            description: field(values, "description").to_string(),
            priority: Priority::parse(field(values, "priority")).unwrap_or_default(),
            status: Status::parse(field(values, "status")),
            due_date: if due.is_empty() {
                None
            } else {
                Some(due.to_string())
            },
            category_id: field(values, "category_id").parse().ok(),
        }
    }
}

fn field<'a>(values: &'a FormSnapshot, name: &str) -> &'a str {
    values.get(name).map(|v| v.trim()).unwrap_or_default()
}
