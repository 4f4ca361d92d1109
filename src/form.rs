//! Typed form descriptors and the editable state behind each modal dialog.
//!
//! A [`Form`] is built from a list of [`FieldSpec`]s. The schema decides
//! which rules the validation engine applies to a field, so nothing needs to
//! look fields up by ad hoc conventions other than the `password` /
//! `confirm_password` pair.

use crate::model::{Category, Priority, Status};
use crate::validation::Annotation;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Form id used for autosave when a form has none of its own.
pub const DEFAULT_FORM_KEY: &str = "default";

pub type FormSnapshot = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextArea,
    Email,
    Password,
    Date,
    Select(Vec<Choice>),
}

/// One entry of a select field: the submitted value and the text shown for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Choice {
            value: value.into(),
            label: label.into(),
        }
    }
}

impl From<&str> for Choice {
    fn from(value: &str) -> Self {
        Choice::new(value, value)
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FieldValue {
    pub value: String,
    pub cursor: usize,
}

impl FieldValue {
    pub fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.len();
    }

    pub fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    pub fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    pub fn move_up(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx == 0 {
            return;
        }
        let target_start = line_starts[line_idx - 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    pub fn move_down(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx + 1 >= line_starts.len() {
            return;
        }
        let target_start = line_starts[line_idx + 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    pub fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub spec: FieldSpec,
    pub value: FieldValue,
    pub annotation: Option<Annotation>,
    default: String,
}

impl Field {
    fn new(spec: FieldSpec) -> Self {
        let default = match &spec.kind {
            FieldKind::Select(options) => options.first().map(|c| c.value.clone()).unwrap_or_default(),
            _ => String::new(),
        };
        Field {
            value: FieldValue::new(&default),
            spec,
            annotation: None,
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn is_invalid(&self) -> bool {
        self.annotation.is_some()
    }

    /// Select fields step through their options instead of taking text.
    pub fn cycle_option(&mut self, forward: bool) -> bool {
        let options = match &self.spec.kind {
            FieldKind::Select(options) if !options.is_empty() => options,
            _ => return false,
        };
        let current = options
            .iter()
            .position(|c| c.value == self.value.value)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % options.len()
        } else {
            (current + options.len() - 1) % options.len()
        };
        let chosen = options[next].value.clone();
        self.value.set(&chosen);
        true
    }

    /// Swaps the options of a select field. The current value and the
    /// default survive when the new options still offer them.
    pub fn set_choices(&mut self, choices: Vec<Choice>) -> bool {
        if !matches!(self.spec.kind, FieldKind::Select(_)) {
            return false;
        }
        let first = choices.first().map(|c| c.value.clone()).unwrap_or_default();
        let offers = |value: &str| choices.iter().any(|c| c.value == value);
        if !offers(&self.value.value) {
            self.value.set(&first);
        }
        if !offers(&self.default) {
            self.default = first;
        }
        self.spec.kind = FieldKind::Select(choices);
        true
    }

    /// What the field shows: the label of the chosen option for selects.
    pub fn display_value(&self) -> &str {
        match &self.spec.kind {
            FieldKind::Select(options) => options
                .iter()
                .find(|c| c.value == self.value.value)
                .map(|c| c.label.as_str())
                .unwrap_or(&self.value.value),
            _ => &self.value.value,
        }
    }
}

/// The submit control of a form. Engaging it disables further submits and
/// shows a busy label until the re-enable deadline passes.
#[derive(Debug, Clone)]
pub struct SubmitControl {
    label: String,
    busy_until: Option<Instant>,
}

pub const BUSY_LABEL: &str = "Processing...";

impl SubmitControl {
    pub fn new(label: impl Into<String>) -> Self {
        SubmitControl {
            label: label.into(),
            busy_until: None,
        }
    }

    pub fn engage(&mut self, now: Instant, timeout: Duration) {
        self.busy_until = Some(now + timeout);
    }

    pub fn is_busy(&self) -> bool {
        self.busy_until.is_some()
    }

    /// Returns true when the control was re-enabled by this call.
    pub fn release_if_due(&mut self, now: Instant) -> bool {
        match self.busy_until {
            Some(deadline) if now >= deadline => {
                self.busy_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn display_label(&self) -> &str {
        if self.is_busy() {
            BUSY_LABEL
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    id: Option<String>,
    pub title: String,
    fields: Vec<Field>,
    focus: Option<usize>,
    pub submit: SubmitControl,
}

impl Form {
    pub fn new(id: Option<&str>, title: impl Into<String>, specs: Vec<FieldSpec>) -> Self {
        Form {
            id: id.map(str::to_string),
            title: title.into(),
            fields: specs.into_iter().map(Field::new).collect(),
            focus: None,
            submit: SubmitControl::new("Save"),
        }
    }

    pub fn with_submit_label(mut self, label: impl Into<String>) -> Self {
        self.submit = SubmitControl::new(label);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn storage_key(&self) -> &str {
        self.id.as_deref().unwrap_or(DEFAULT_FORM_KEY)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.spec.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.spec.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.value.as_str())
    }

    pub fn set_value(&mut self, name: &str, value: &str) -> bool {
        match self.field_mut(name) {
            Some(field) => {
                field.value.set(value);
                true
            }
            None => false,
        }
    }

    pub fn set_choices(&mut self, name: &str, choices: Vec<Choice>) -> bool {
        self.field_mut(name)
            .map(|field| field.set_choices(choices))
            .unwrap_or(false)
    }

    /// Replace both the defaults and the current values, as when a form is
    /// prefilled from an existing record.
    pub fn load_defaults(&mut self, values: &FormSnapshot) {
        for field in &mut self.fields {
            if let Some(value) = values.get(&field.spec.name) {
                field.default = value.clone();
                field.value.set(value);
            }
        }
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.fields
            .iter()
            .map(|f| (f.spec.name.clone(), f.value.value.clone()))
            .collect()
    }

    /// Back to default values with no annotations left behind.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            let default = field.default.clone();
            field.value.set(&default);
        }
        self.clear_annotations();
    }

    pub fn clear_annotations(&mut self) {
        for field in &mut self.fields {
            field.annotation = None;
        }
    }

    pub fn annotate(&mut self, name: &str, annotation: Annotation) {
        if let Some(field) = self.field_mut(name) {
            field.annotation = Some(annotation);
        }
    }

    pub fn annotations(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.fields
            .iter()
            .filter_map(|f| f.annotation.as_ref().map(|a| (f.name(), a)))
    }

    pub fn focus_first_input(&mut self) {
        self.focus = if self.fields.is_empty() { None } else { Some(0) };
    }

    pub fn blur(&mut self) {
        self.focus = None;
    }

    pub fn has_focus(&self) -> bool {
        self.focus.is_some()
    }

    pub fn focus_index(&self) -> Option<usize> {
        self.focus
    }

    pub fn focused_field(&self) -> Option<&Field> {
        self.focus.and_then(|idx| self.fields.get(idx))
    }

    pub fn focused_field_mut(&mut self) -> Option<&mut Field> {
        match self.focus {
            Some(idx) => self.fields.get_mut(idx),
            None => None,
        }
    }

    pub fn next_field(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        self.focus = Some(match self.focus {
            Some(idx) => (idx + 1) % self.fields.len(),
            None => 0,
        });
    }

    pub fn prev_field(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        let len = self.fields.len();
        self.focus = Some(match self.focus {
            Some(idx) => (idx + len - 1) % len,
            None => len - 1,
        });
    }
}

pub const ADD_TASK_FORM_ID: &str = "addTaskForm";
pub const EDIT_TASK_FORM_ID: &str = "editTaskForm";
pub const CATEGORY_FORM_ID: &str = "categoryForm";
pub const DEFAULT_CATEGORY_COLOR: &str = "#007bff";
pub const NO_CATEGORY_LABEL: &str = "No category";

fn task_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::text("title", "Title").required(),
        FieldSpec::new("description", "Description", FieldKind::TextArea),
        FieldSpec::new(
            "priority",
            "Priority",
            FieldKind::Select(Priority::ALL.iter().map(|p| Choice::from(p.as_str())).collect()),
        ),
        FieldSpec::new("due_date", "Due (YYYY-MM-DD)", FieldKind::Date),
        FieldSpec::new(
            "category_id",
            "Category",
            FieldKind::Select(category_choices(&[])),
        ),
    ]
}

/// Options for the category select, with "no category" first.
pub fn category_choices(categories: &[Category]) -> Vec<Choice> {
    let mut choices = vec![Choice::new("", NO_CATEGORY_LABEL)];
    choices.extend(
        categories
            .iter()
            .map(|c| Choice::new(c.id.to_string(), c.name.clone())),
    );
    choices
}

fn with_task_defaults(mut form: Form) -> Form {
    let mut defaults = FormSnapshot::new();
    defaults.insert("priority".into(), Priority::default().as_str().into());
    form.load_defaults(&defaults);
    form
}

pub fn add_task_form() -> Form {
    with_task_defaults(
        Form::new(Some(ADD_TASK_FORM_ID), "Add Task", task_fields()).with_submit_label("Add Task"),
    )
}

pub fn edit_task_form() -> Form {
    let mut fields = task_fields();
    fields.push(FieldSpec::new(
        "status",
        "Status",
        FieldKind::Select(Status::ALL.iter().map(|s| Choice::from(s.as_str())).collect()),
    ));
    with_task_defaults(
        Form::new(Some(EDIT_TASK_FORM_ID), "Edit Task", fields).with_submit_label("Update Task"),
    )
}

pub fn category_form() -> Form {
    let mut form = Form::new(
        Some(CATEGORY_FORM_ID),
        "Add Category",
        vec![
            FieldSpec::text("name", "Name").required(),
            FieldSpec::text("color", "Color"),
        ],
    )
    .with_submit_label("Add Category");
    let mut defaults = FormSnapshot::new();
    defaults.insert("color".into(), DEFAULT_CATEGORY_COLOR.into());
    form.load_defaults(&defaults);
    form
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    let line_idx = starts
        .iter()
        .rposition(|start| *start <= cursor)
        .unwrap_or(0);
    let col = text[starts[line_idx]..cursor].chars().count();
    (starts, line_idx, col)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    slice[..limit]
        .char_indices()
        .nth(target_col)
        .map(|(idx, _)| start + idx)
        .unwrap_or(start + limit)
}
