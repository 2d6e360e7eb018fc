//! Tool Call Manager: tracks tool invocations from selection through
//! execution to completion, and buffers completed calls awaiting
//! attachment to a message.
//!
//! Active tools are kept in an [`IndexMap`] rather than a `HashMap` so
//! `get_active_notifications` returns them in first-observed order — the
//! UI renders tool notifications in the order they appeared, not hash order.

use crate::model::{ToolCallWithResult, ToolNotification, ToolStatus};
use indexmap::IndexMap;

/// Counts of tools currently tracked by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolManagerStats {
    pub active: usize,
    pub completed: usize,
}

#[derive(Default)]
pub struct ToolCallManager {
    active: IndexMap<String, ToolNotification>,
    completed: Vec<ToolCallWithResult>,
}

impl ToolCallManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tool id is first observed with status `preparing`. If the id is
    /// already tracked (a second `tool_select_delta` for the same call),
    /// its arguments are updated in place rather than resetting status.
    pub fn on_tool_select(
        &mut self,
        id: &str,
        tool_name: &str,
        session_id: &str,
        arguments: &str,
        timestamp: &str,
    ) -> &ToolNotification {
        self.active
            .entry(id.to_string())
            .and_modify(|n| {
                n.arguments = arguments.to_string();
            })
            .or_insert_with(|| ToolNotification {
                id: id.to_string(),
                tool_name: tool_name.to_string(),
                status: ToolStatus::Preparing,
                session_id: session_id.to_string(),
                timestamp: timestamp.to_string(),
                arguments: arguments.to_string(),
            });
        &self.active[id]
    }

    /// Promote an existing notification to `executing`, or create one
    /// directly at `executing` if the select phase was skipped. A tool id
    /// never regresses to `preparing` once here.
    pub fn on_tool_call_active(
        &mut self,
        id: &str,
        tool_name: &str,
        session_id: &str,
        arguments: &str,
        timestamp: &str,
    ) -> &ToolNotification {
        let entry = self.active.entry(id.to_string()).or_insert_with(|| ToolNotification {
            id: id.to_string(),
            tool_name: tool_name.to_string(),
            status: ToolStatus::Executing,
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
            arguments: arguments.to_string(),
        });
        entry.status = ToolStatus::Executing;
        entry.tool_name = tool_name.to_string();
        entry.arguments = arguments.to_string();
        entry
    }

    /// Remove one or more tool ids from the active map and append their
    /// call+result pairs to the completed buffer. Completion is terminal:
    /// a completed id is never re-added to `active`.
    pub fn on_tool_call_complete(&mut self, pairs: Vec<ToolCallWithResult>) {
        for pair in pairs {
            self.active.shift_remove(&pair.call.id);
            self.completed.push(pair);
        }
    }

    /// Remove every active notification whose tool name matches, without
    /// requiring completion. Used when a thought stream starts: the `think`
    /// tool's content is its display, so its in-progress notification is
    /// simply dropped rather than completed.
    pub fn remove_active_by_name(&mut self, tool_name: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .active
            .iter()
            .filter(|(_, n)| n.tool_name == tool_name)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.active.shift_remove(id);
        }
        ids
    }

    pub fn remove_active(&mut self, id: &str) -> Option<ToolNotification> {
        self.active.shift_remove(id)
    }

    pub fn get_active_notifications(&self) -> impl Iterator<Item = &ToolNotification> {
        self.active.values()
    }

    pub fn get_completed_tool_calls(&self) -> &[ToolCallWithResult] {
        &self.completed
    }

    /// Take and clear the completed buffer, for attachment to a finalizing
    /// message.
    pub fn drain_completed(&mut self) -> Vec<ToolCallWithResult> {
        std::mem::take(&mut self.completed)
    }

    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }

    pub fn reset(&mut self) {
        self.active.clear();
        self.completed.clear();
    }

    pub fn get_statistics(&self) -> ToolManagerStats {
        ToolManagerStats {
            active: self.active.len(),
            completed: self.completed.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ToolCall, ToolResult};
    use serde_json::Value;

    fn pair(id: &str) -> ToolCallWithResult {
        ToolCallWithResult {
            call: ToolCall {
                id: id.to_string(),
                name: "workspace_read".to_string(),
                input: Value::Null,
            },
            result: ToolResult {
                tool_use_id: id.to_string(),
                content: "contents".to_string(),
                is_error: None,
            },
        }
    }

    #[test]
    fn select_then_active_promotes_status() {
        let mut manager = ToolCallManager::new();
        manager.on_tool_select("t1", "workspace_read", "s1", "{}", "ts");
        assert_eq!(
            manager.get_active_notifications().next().unwrap().status,
            ToolStatus::Preparing
        );

        manager.on_tool_call_active("t1", "workspace_read", "s1", "{\"path\":\"a\"}", "ts2");
        let notification = manager.get_active_notifications().next().unwrap();
        assert_eq!(notification.status, ToolStatus::Executing);
        assert_eq!(notification.arguments, "{\"path\":\"a\"}");
    }

    #[test]
    fn active_without_prior_select_creates_directly() {
        let mut manager = ToolCallManager::new();
        manager.on_tool_call_active("t1", "workspace_read", "s1", "{}", "ts");
        assert_eq!(manager.get_statistics().active, 1);
    }

    #[test]
    fn completion_moves_tool_from_active_to_completed() {
        let mut manager = ToolCallManager::new();
        manager.on_tool_select("t1", "workspace_read", "s1", "{}", "ts");
        manager.on_tool_call_complete(vec![pair("t1")]);

        assert_eq!(manager.get_statistics(), ToolManagerStats { active: 0, completed: 1 });
    }

    #[test]
    fn remove_active_by_name_drops_matching_think_notifications() {
        let mut manager = ToolCallManager::new();
        manager.on_tool_select("t1", "think", "s1", "{}", "ts");
        manager.on_tool_select("t2", "workspace_read", "s1", "{}", "ts");

        let removed = manager.remove_active_by_name("think");
        assert_eq!(removed, vec!["t1".to_string()]);
        assert_eq!(manager.get_statistics().active, 1);
    }

    #[test]
    fn drain_completed_empties_buffer() {
        let mut manager = ToolCallManager::new();
        manager.on_tool_call_complete(vec![pair("t1"), pair("t2")]);
        let drained = manager.drain_completed();
        assert_eq!(drained.len(), 2);
        assert!(manager.get_completed_tool_calls().is_empty());
    }

    #[test]
    fn reset_clears_both_maps() {
        let mut manager = ToolCallManager::new();
        manager.on_tool_select("t1", "workspace_read", "s1", "{}", "ts");
        manager.on_tool_call_complete(vec![pair("t2")]);
        manager.reset();
        assert_eq!(manager.get_statistics(), ToolManagerStats::default());
    }
}
