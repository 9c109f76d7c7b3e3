//! Projects group tasks; they never own them.

use chrono::{DateTime, Utc};

use crate::document::{CalendarDocument, ItemId, Project};
use crate::error::{WeekplanError, WeekplanResult};
use crate::ids;
use crate::schedule::colors::PALETTE;
use crate::schedule::tasks::validate_name;

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub color: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectEdit {
    pub name: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub collapsed: Option<bool>,
    pub sort_order: Option<i64>,
    pub archived: Option<bool>,
}

impl CalendarDocument {
    pub(crate) fn require_project(&self, id: &ItemId) -> WeekplanResult<()> {
        if self.projects.iter().any(|p| &p.id == id) {
            Ok(())
        } else {
            Err(WeekplanError::UnknownProject(id.to_string()))
        }
    }

    /// Add a project at the end of the sort order.
    pub fn add_project(&mut self, draft: NewProject, now: DateTime<Utc>) -> WeekplanResult<ItemId> {
        validate_name(&draft.name)?;

        let sort_order = self.projects.iter().map(|p| p.sort_order + 1).max().unwrap_or(0);
        let color = draft
            .color
            .unwrap_or_else(|| PALETTE[self.projects.len() % PALETTE.len()].to_string());

        let id = ids::project_id();
        self.projects.push(Project {
            id: id.clone(),
            name: draft.name.trim().to_string(),
            color,
            notes: draft.notes,
            collapsed: false,
            sort_order,
            archived: false,
            created_at: Some(now),
            updated_at: Some(now),
        });
        Ok(id)
    }

    pub fn edit_project(&mut self, id: &ItemId, edit: ProjectEdit, now: DateTime<Utc>) -> WeekplanResult<()> {
        if let Some(name) = &edit.name {
            validate_name(name)?;
        }

        let project = self
            .projects
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| WeekplanError::UnknownProject(id.to_string()))?;

        if let Some(name) = edit.name {
            project.name = name.trim().to_string();
        }
        if let Some(color) = edit.color {
            project.color = color;
        }
        if let Some(notes) = edit.notes {
            project.notes = notes;
        }
        if let Some(collapsed) = edit.collapsed {
            project.collapsed = collapsed;
        }
        if let Some(sort_order) = edit.sort_order {
            project.sort_order = sort_order;
        }
        if let Some(archived) = edit.archived {
            project.archived = archived;
        }
        project.updated_at = Some(now);
        Ok(())
    }

    /// Delete a project. Its tasks, occurrences and completion records
    /// become standalone; nothing else is removed.
    pub fn delete_project(&mut self, id: &ItemId) -> WeekplanResult<()> {
        self.require_project(id)?;
        self.projects.retain(|p| &p.id != id);

        let orphan = |project_id: &mut Option<ItemId>| {
            if project_id.as_ref() == Some(id) {
                *project_id = None;
            }
        };
        self.tasks.iter_mut().for_each(|t| orphan(&mut t.project_id));
        self.scheduled_tasks.iter_mut().for_each(|s| orphan(&mut s.project_id));
        self.completed_tasks.iter_mut().for_each(|c| orphan(&mut c.project_id));
        Ok(())
    }

    /// Projects in display order, optionally including archived ones.
    pub fn projects_sorted(&self, include_archived: bool) -> Vec<&Project> {
        let mut projects: Vec<_> = self
            .projects
            .iter()
            .filter(|p| include_archived || !p.archived)
            .collect();
        projects.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        projects
    }
}
