use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ordering;

/// Ids and counters are stored as signed 64-bit integers by the SQL
/// backends, and `next_id` must stay representable above the largest id.
pub const MAX_TODO_ID: u64 = i64::MAX as u64 - 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub urgent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Todo {
    pub fn new(id: u64, text: impl Into<String>) -> Result<Self, ValidationError> {
        let todo = Self {
            id,
            text: text.into(),
            completed: false,
            urgent: false,
            position: None,
            created_at: Some(Utc::now()),
        };
        todo.validate()?;
        Ok(todo)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id > MAX_TODO_ID {
            return Err(ValidationError::IdOutOfRange(self.id));
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText(self.id));
        }
        Ok(())
    }

    /// Secondary sort key; a todo without an explicit position sorts by its id.
    pub fn sort_position(&self) -> i64 {
        self.position
            .unwrap_or_else(|| i64::try_from(self.id).unwrap_or(i64::MAX))
    }
}

/// Everything stored under one category name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    #[serde(default)]
    pub todos: Vec<Todo>,
    #[serde(default = "default_next_id")]
    pub next_id: u64,
}

fn default_next_id() -> u64 {
    1
}

impl Default for CategoryRecord {
    fn default() -> Self {
        Self {
            todos: Vec::new(),
            next_id: default_next_id(),
        }
    }
}

impl CategoryRecord {
    pub fn new(todos: Vec<Todo>, next_id: u64) -> Self {
        Self { todos, next_id }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.next_id > MAX_TODO_ID + 1 {
            return Err(ValidationError::NextIdOutOfRange(self.next_id));
        }
        let mut seen = std::collections::HashSet::new();
        for todo in &self.todos {
            todo.validate()?;
            if !seen.insert(todo.id) {
                return Err(ValidationError::DuplicateTodoId(todo.id));
            }
        }
        Ok(())
    }

    /// Reconciles the stored counter with the todos actually present so an id
    /// in use is never handed out again.
    pub fn reconciled(mut self) -> Self {
        self.next_id = self.next_id.max(ordering::next_id(&self.todos));
        self
    }
}

pub fn validate_category_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCategoryName);
    }
    if trimmed == "." || trimmed == ".." || name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(ValidationError::InvalidCategoryName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Todo {0} has empty text")]
    EmptyText(u64),
    #[error("Todo id {0} is out of range (max {})", MAX_TODO_ID)]
    IdOutOfRange(u64),
    #[error("nextId {0} is out of range")]
    NextIdOutOfRange(u64),
    #[error("Duplicate todo id: {0}")]
    DuplicateTodoId(u64),
    #[error("Category name cannot be empty")]
    EmptyCategoryName,
    #[error("Invalid category name: {0}")]
    InvalidCategoryName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_defaults_from_minimal_json() {
        let todo: Todo = serde_json::from_str(r#"{"id":3,"text":"Buy milk"}"#).unwrap();
        assert!(!todo.completed);
        assert!(!todo.urgent);
        assert_eq!(todo.position, None);
        assert_eq!(todo.sort_position(), 3);
    }

    #[test]
    fn test_todo_serializes_camel_case_without_empty_optionals() {
        let todo = Todo {
            id: 1,
            text: "A".to_string(),
            completed: false,
            urgent: true,
            position: None,
            created_at: None,
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json, serde_json::json!({"id":1,"text":"A","completed":false,"urgent":true}));
    }

    #[test]
    fn test_empty_text_rejected() {
        assert_eq!(Todo::new(1, "   ").unwrap_err(), ValidationError::EmptyText(1));
    }

    #[test]
    fn test_record_default_and_missing_next_id() {
        let record: CategoryRecord = serde_json::from_str(r#"{"todos":[]}"#).unwrap();
        assert_eq!(record, CategoryRecord::default());
        assert_eq!(record.next_id, 1);
    }

    #[test]
    fn test_record_rejects_duplicate_ids() {
        let record = CategoryRecord::new(
            vec![Todo::new(1, "a").unwrap(), Todo::new(1, "b").unwrap()],
            2,
        );
        assert_eq!(record.validate(), Err(ValidationError::DuplicateTodoId(1)));
    }

    #[test]
    fn test_reconciled_next_id_never_below_max_id() {
        let record = CategoryRecord::new(vec![Todo::new(7, "a").unwrap()], 2).reconciled();
        assert_eq!(record.next_id, 8);

        let record = CategoryRecord::new(vec![Todo::new(1, "a").unwrap()], 10).reconciled();
        assert_eq!(record.next_id, 10);
    }

    #[test]
    fn test_ids_beyond_storable_range_rejected() {
        let huge = Todo {
            id: u64::MAX,
            text: "too big".to_string(),
            completed: false,
            urgent: false,
            position: None,
            created_at: None,
        };
        assert_eq!(huge.validate(), Err(ValidationError::IdOutOfRange(u64::MAX)));
        assert_eq!(huge.sort_position(), i64::MAX);
        assert!(Todo::new(MAX_TODO_ID, "largest").is_ok());

        let record = CategoryRecord::new(Vec::new(), u64::MAX);
        assert_eq!(record.validate(), Err(ValidationError::NextIdOutOfRange(u64::MAX)));
        assert!(CategoryRecord::new(vec![Todo::new(MAX_TODO_ID, "a").unwrap()], MAX_TODO_ID + 1)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_reconciled_survives_largest_id() {
        let mut todo = Todo::new(1, "legacy").unwrap();
        todo.id = u64::MAX;
        let record = CategoryRecord::new(vec![todo], 1).reconciled();
        assert_eq!(record.next_id, u64::MAX);
    }

    #[test]
    fn test_category_name_validation() {
        assert!(validate_category_name("work").is_ok());
        assert!(validate_category_name("Home Chores").is_ok());
        assert_eq!(validate_category_name(" "), Err(ValidationError::EmptyCategoryName));
        assert!(validate_category_name("../etc").is_err());
        assert!(validate_category_name("a\\b").is_err());
        assert!(validate_category_name("..").is_err());
    }
}
