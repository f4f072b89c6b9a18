//! Display order for todos within a category.
//!
//! Urgent todos come first, then everything is ordered by position (falling
//! back to the id when no position was set). The sort is stable: todos with
//! the same urgency and position keep their stored relative order.

use super::Todo;
use std::cmp::Reverse;

pub fn order(todos: &[Todo]) -> Vec<Todo> {
    let mut ordered = todos.to_vec();
    // slice::sort_by_key is stable
    ordered.sort_by_key(|t| (Reverse(t.urgent), t.sort_position()));
    ordered
}

/// Smallest id guaranteed unused by `todos`. Saturates at `u64::MAX`;
/// writes reject ids that large, so only unvalidated data can get there.
pub fn next_id(todos: &[Todo]) -> u64 {
    todos
        .iter()
        .map(|t| t.id)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: u64, urgent: bool, position: Option<i64>) -> Todo {
        Todo {
            id,
            text: format!("todo {}", id),
            completed: false,
            urgent,
            position,
            created_at: None,
        }
    }

    fn ids(todos: &[Todo]) -> Vec<u64> {
        todos.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_urgent_first_then_position() {
        let todos = vec![
            todo(1, false, Some(5)),
            todo(2, true, Some(1)),
            todo(3, false, Some(2)),
        ];
        assert_eq!(ids(&order(&todos)), vec![2, 3, 1]);
    }

    #[test]
    fn test_missing_position_falls_back_to_id() {
        let todos = vec![todo(4, false, None), todo(9, false, Some(1)), todo(2, false, None)];
        assert_eq!(ids(&order(&todos)), vec![9, 2, 4]);
    }

    #[test]
    fn test_ties_keep_stored_order() {
        let todos = vec![
            todo(5, true, Some(3)),
            todo(1, false, Some(3)),
            todo(3, true, Some(3)),
            todo(2, false, Some(3)),
        ];
        assert_eq!(ids(&order(&todos)), vec![5, 3, 1, 2]);
    }

    #[test]
    fn test_order_does_not_touch_input() {
        let todos = vec![todo(2, false, None), todo(1, true, None)];
        let _ = order(&todos);
        assert_eq!(ids(&todos), vec![2, 1]);
    }

    #[test]
    fn test_next_id() {
        assert_eq!(next_id(&[]), 1);
        assert_eq!(next_id(&[todo(3, false, None), todo(8, false, None)]), 9);
    }

    #[test]
    fn test_next_id_saturates_at_max() {
        assert_eq!(next_id(&[todo(u64::MAX, false, None)]), u64::MAX);
    }

    #[test]
    fn test_order_with_id_beyond_i64() {
        let todos = vec![todo(u64::MAX, false, None), todo(1, false, None)];
        assert_eq!(ids(&order(&todos)), vec![1, u64::MAX]);
    }
}
