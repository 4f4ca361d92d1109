//! Modal lifecycle, global shortcuts and drag state for task rows.

use crate::model::TaskId;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    SubmitForm,
    CloseModal,
    NewTask,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShortcutContext {
    pub form_focused: bool,
    pub modal_open: bool,
}

fn command_held(key: &KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER)
}

/// At most one shortcut per key press, checked in priority order.
pub fn resolve_shortcut(key: &KeyEvent, ctx: ShortcutContext) -> Option<Shortcut> {
    if command_held(key) && key.code == KeyCode::Enter && ctx.form_focused {
        return Some(Shortcut::SubmitForm);
    }
    if key.code == KeyCode::Esc && ctx.modal_open {
        return Some(Shortcut::CloseModal);
    }
    if command_held(key) && key.code == KeyCode::Char('n') {
        return Some(Shortcut::NewTask);
    }
    None
}

/// Index into the application's form list.
pub type FormSlot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    AddTask,
    EditTask(TaskId),
    AddCategory,
    ConfirmDelete(TaskId),
}

#[derive(Debug, Clone)]
pub struct Modal {
    pub kind: ModalKind,
    pub form: Option<FormSlot>,
    focus_at: Option<Instant>,
}

impl Modal {
    pub fn new(kind: ModalKind, form: Option<FormSlot>) -> Self {
        Modal {
            kind,
            form,
            focus_at: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ModalStack {
    stack: Vec<Modal>,
}

impl ModalStack {
    /// Opens a modal on top. Modals with a form get their first input
    /// focused once `focus_delay` has passed.
    pub fn open(&mut self, mut modal: Modal, now: Instant, focus_delay: Duration) {
        if modal.form.is_some() {
            modal.focus_at = Some(now + focus_delay);
        }
        self.stack.push(modal);
    }

    /// Closes the topmost modal. The caller resets its form.
    pub fn close_top(&mut self) -> Option<Modal> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&Modal> {
        self.stack.last()
    }

    pub fn is_open(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn contains(&self, kind: ModalKind) -> bool {
        self.stack.iter().any(|m| m.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modal> {
        self.stack.iter()
    }

    /// Forms whose focus delay has elapsed by `now`.
    pub fn take_due_focus(&mut self, now: Instant) -> Vec<FormSlot> {
        let mut due = Vec::new();
        for modal in &mut self.stack {
            if let (Some(at), Some(slot)) = (modal.focus_at, modal.form) {
                if now >= at {
                    modal.focus_at = None;
                    due.push(slot);
                }
            }
        }
        due
    }
}

/// The task row currently being dragged, if any. Dropping is not handled.
#[derive(Debug, Default)]
pub struct DragState {
    source: Option<TaskId>,
}

impl DragState {
    pub fn start(&mut self, task_id: TaskId) {
        self.source = Some(task_id);
    }

    pub fn end(&mut self) -> Option<TaskId> {
        self.source.take()
    }

    pub fn payload(&self) -> Option<String> {
        self.source.map(|id| id.to_string())
    }

    pub fn is_dragging(&self, task_id: TaskId) -> bool {
        self.source == Some(task_id)
    }
}
