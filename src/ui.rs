use crate::api::ApiClient;
use crate::autosave::AutoSave;
use crate::config::TimingConfig;
use crate::form::{
    add_task_form, category_choices, category_form, edit_task_form, Field, FieldKind, Form,
    DEFAULT_CATEGORY_COLOR,
};
use crate::interaction::{
    resolve_shortcut, DragState, FormSlot, Modal, ModalKind, ModalStack, Shortcut,
    ShortcutContext,
};
use crate::model::{Category, CategoryDraft, Status, Task, TaskDraft, TaskId};
use crate::notify::Notifications;
use crate::storage::KeyValueStore;
use crate::util::{due_label, truncate_text, Tone};
use crate::validation::{validate, Verdict};
use anyhow::Result;
use chrono::Local;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const ADD_FORM: FormSlot = 0;
const EDIT_FORM: FormSlot = 1;
const CATEGORY_FORM: FormSlot = 2;

/// Everything the interactive client needs, built once by the caller.
pub struct AppContext<S: KeyValueStore> {
    pub api: ApiClient,
    pub autosave: AutoSave<S>,
    pub timing: TimingConfig,
    pub server: String,
}

pub fn run<S: KeyValueStore>(ctx: AppContext<S>) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(ctx);
    app.refresh();
    let result = app.event_loop(&mut terminal);
    if app.autosave.is_pending() && app.autosave.flush() {
        info!("pending draft written on exit");
    }
    teardown_terminal(&mut terminal)?;
    result
}

struct App<S: KeyValueStore> {
    api: ApiClient,
    autosave: AutoSave<S>,
    timing: TimingConfig,
    server: String,
    forms: Vec<Form>,
    tasks: Vec<Task>,
    selected_column: usize,
    selected_row: usize,
    scroll_offsets: Vec<usize>,
    row_hits: Vec<(Rect, TaskId)>,
    status: String,
    modals: ModalStack,
    notices: Notifications,
    drag: DragState,
    pending_submit: Option<FormSlot>,
    last_sync: Option<Instant>,
}

impl<S: KeyValueStore> App<S> {
    fn new(ctx: AppContext<S>) -> Self {
        let mut forms = vec![add_task_form(), edit_task_form(), category_form()];
        let restored = ctx.autosave.restore_on_load(&mut forms);
        let status = if restored > 0 {
            format!("Restored {} saved field(s) from drafts", restored)
        } else {
            format!("Connected to {}", ctx.server)
        };
        App {
            api: ctx.api,
            autosave: ctx.autosave,
            notices: Notifications::new(ctx.timing.notification_ttl()),
            timing: ctx.timing,
            server: ctx.server,
            forms,
            tasks: Vec::new(),
            selected_column: 0,
            selected_row: 0,
            scroll_offsets: vec![0; Status::ALL.len()],
            row_hits: Vec::new(),
            status,
            modals: ModalStack::default(),
            drag: DragState::default(),
            pending_submit: None,
            last_sync: None,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.tick(Instant::now());
            terminal.draw(|f| self.draw(f))?;
            // The busy label is on screen before the blocking request goes out.
            if let Some(slot) = self.pending_submit.take() {
                self.dispatch_submit(slot);
                continue;
            }
            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key, Instant::now())? {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self, now: Instant) {
        self.autosave.poll(now);
        for form in &mut self.forms {
            if form.submit.release_if_due(now) {
                debug!(form = form.storage_key(), "submit control re-enabled");
            }
        }
        for slot in self.modals.take_due_focus(now) {
            if let Some(form) = self.forms.get_mut(slot) {
                form.focus_first_input();
            }
        }
        self.notices.expire(now);
    }

    fn top_form_slot(&self) -> Option<FormSlot> {
        self.modals.top().and_then(|m| m.form)
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Result<bool> {
        let ctx = ShortcutContext {
            form_focused: self
                .top_form_slot()
                .map(|slot| self.forms[slot].has_focus())
                .unwrap_or(false),
            modal_open: self.modals.is_open(),
        };
        if let Some(shortcut) = resolve_shortcut(&key, ctx) {
            match shortcut {
                Shortcut::SubmitForm => self.request_submit(now),
                Shortcut::CloseModal => self.close_top_modal(),
                Shortcut::NewTask => self.open_add_task(now),
            }
            return Ok(false);
        }

        match self.modals.top().map(|m| (m.kind, m.form)) {
            Some((ModalKind::ConfirmDelete(task_id), _)) => {
                self.handle_confirm_key(task_id, key);
                Ok(false)
            }
            Some((_, Some(slot))) => {
                self.handle_form_key(slot, key, now);
                Ok(false)
            }
            Some((_, None)) => Ok(false),
            None => self.handle_normal_key(key, now),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent, now: Instant) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('n') => self.open_add_task(now),
            KeyCode::Char('c') => self.open_modal(ModalKind::AddCategory, Some(CATEGORY_FORM), now),
            KeyCode::Char('e') => self.open_edit_task(now),
            KeyCode::Char('d') => match self.current_task() {
                Some(task) => {
                    let id = task.id;
                    self.open_modal(ModalKind::ConfirmDelete(id), None, now);
                    self.status = format!("Delete #{}? (y to confirm, n/Esc to cancel)", id);
                }
                None => self.status = "No task selected to delete".into(),
            },
            KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('x') => {
                if self.notices.dismiss_latest().is_some() {
                    self.status = "Dismissed".into();
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.prev_column(),
            KeyCode::Right | KeyCode::Char('l') => self.next_column(),
            KeyCode::Up | KeyCode::Char('k') => self.prev_row(),
            KeyCode::Down | KeyCode::Char('j') => self.next_row(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_key(&mut self, slot: FormSlot, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Tab => {
                self.forms[slot].next_field();
                return;
            }
            KeyCode::BackTab => {
                self.forms[slot].prev_field();
                return;
            }
            _ => {}
        }
        // Nothing is typed into the form until its first input has focus.
        let is_textarea = match self.forms[slot].focused_field() {
            Some(field) => field.spec.kind == FieldKind::TextArea,
            None => return,
        };
        if key.code == KeyCode::Enter && !is_textarea {
            self.request_submit(now);
            return;
        }
        let field = match self.forms[slot].focused_field_mut() {
            Some(field) => field,
            None => return,
        };
        let changed = match key.code {
            KeyCode::Left => field.cycle_option(false) || {
                field.value.move_left();
                false
            },
            KeyCode::Right => field.cycle_option(true) || {
                field.value.move_right();
                false
            },
            KeyCode::Up => {
                field.value.move_up();
                false
            }
            KeyCode::Down => {
                field.value.move_down();
                false
            }
            KeyCode::Enter => {
                field.value.insert_char('\n');
                true
            }
            KeyCode::Backspace => {
                if matches!(field.spec.kind, FieldKind::Select(_)) {
                    false
                } else {
                    field.value.backspace();
                    true
                }
            }
            KeyCode::Char(c) => {
                if key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                    || matches!(field.spec.kind, FieldKind::Select(_))
                {
                    false
                } else {
                    field.value.insert_char(c);
                    true
                }
            }
            _ => false,
        };
        if changed {
            self.autosave.on_input_change(&self.forms[slot], now);
        }
    }

    fn handle_confirm_key(&mut self, task_id: TaskId, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.close_top_modal();
                match self.api.delete_task(task_id, &mut self.notices) {
                    Ok(()) => {
                        self.status = format!("Deleted #{}", task_id);
                        self.refresh();
                    }
                    Err(err) => self.status = format!("Delete failed: {}", err),
                }
            }
            KeyCode::Char('n') => {
                self.close_top_modal();
                self.status = "Delete canceled".into();
            }
            _ => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if self.modals.is_open() {
                    return;
                }
                let hit = self
                    .row_hits
                    .iter()
                    .find(|(rect, _)| contains(*rect, mouse.column, mouse.row))
                    .map(|(_, id)| *id);
                if let Some(task_id) = hit {
                    self.select_task(task_id);
                    self.drag.start(task_id);
                    debug!(payload = ?self.drag.payload(), "drag started");
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(task_id) = self.drag.end() {
                    debug!(task = task_id, "drag ended");
                }
            }
            _ => {}
        }
    }

    fn open_modal(&mut self, kind: ModalKind, form: Option<FormSlot>, now: Instant) {
        if let Some(slot) = form {
            self.status = format!("{} (Tab moves, Ctrl+Enter saves, Esc closes)", self.forms[slot].title);
        }
        self.modals
            .open(Modal::new(kind, form), now, self.timing.focus_delay());
    }

    fn open_add_task(&mut self, now: Instant) {
        if self.modals.contains(ModalKind::AddTask) {
            return;
        }
        self.open_modal(ModalKind::AddTask, Some(ADD_FORM), now);
    }

    fn open_edit_task(&mut self, now: Instant) {
        let (id, values) = match self.current_task() {
            Some(task) => (task.id, task.form_values()),
            None => {
                self.status = "No task selected to edit".into();
                return;
            }
        };
        let form = &mut self.forms[EDIT_FORM];
        form.load_defaults(&values);
        form.clear_annotations();
        self.open_modal(ModalKind::EditTask(id), Some(EDIT_FORM), now);
    }

    /// Hidden modals leave their form reset to defaults with no errors.
    fn close_top_modal(&mut self) {
        if let Some(modal) = self.modals.close_top() {
            if let Some(slot) = modal.form {
                let form = &mut self.forms[slot];
                form.reset();
                form.blur();
                self.status = format!("Closed {}", form.title);
            }
        }
    }

    fn request_submit(&mut self, now: Instant) {
        let slot = match self.top_form_slot() {
            Some(slot) => slot,
            None => return,
        };
        let form = &mut self.forms[slot];
        if form.submit.is_busy() {
            self.status = "Still processing the last submit".into();
            return;
        }
        if let Verdict::Invalid(failures) = validate(form) {
            self.status = format!("{} field(s) need attention", failures.len());
            return;
        }
        form.submit.engage(now, self.timing.busy_timeout());
        self.pending_submit = Some(slot);
    }

    fn dispatch_submit(&mut self, slot: FormSlot) {
        let kind = match self.modals.top() {
            Some(modal) if modal.form == Some(slot) => modal.kind,
            _ => return,
        };
        let values = self.forms[slot].snapshot();
        let outcome = match kind {
            ModalKind::AddTask => self
                .api
                .create_task(&TaskDraft::from_values(&values), &mut self.notices)
                .map(|task| format!("Created task #{}", task.id)),
            ModalKind::EditTask(id) => self
                .api
                .update_task(id, &TaskDraft::from_values(&values), &mut self.notices)
                .map(|task| format!("Updated task #{}", task.id)),
            ModalKind::AddCategory => {
                let draft = CategoryDraft {
                    name: values.get("name").cloned().unwrap_or_default(),
                    color: values
                        .get("color")
                        .filter(|c| !c.trim().is_empty())
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
                };
                self.api
                    .create_category(&draft, &mut self.notices)
                    .map(|category| format!("Created category {}", category.name))
            }
            ModalKind::ConfirmDelete(_) => return,
        };
        match outcome {
            Ok(message) => {
                info!(form = self.forms[slot].storage_key(), "form submitted");
                self.close_top_modal();
                self.refresh();
                self.status = message;
            }
            Err(err) => self.status = format!("Save failed: {}", err),
        }
    }

    fn refresh(&mut self) {
        match self.api.list_tasks(None, &mut self.notices) {
            Ok(tasks) => {
                self.tasks = tasks;
                self.last_sync = Some(Instant::now());
                self.clamp_selection();
            }
            Err(err) => {
                self.status = format!("Could not load tasks: {}", err);
                return;
            }
        }
        match self.api.list_categories(&mut self.notices) {
            Ok(categories) => self.set_categories(categories),
            Err(err) => self.status = format!("Could not load categories: {}", err),
        }
    }

    fn set_categories(&mut self, categories: Vec<Category>) {
        debug!(count = categories.len(), "categories loaded");
        for slot in [ADD_FORM, EDIT_FORM] {
            self.forms[slot].set_choices("category_id", category_choices(&categories));
        }
    }

    fn toggle_selected(&mut self) {
        let id = match self.current_task() {
            Some(task) => task.id,
            None => {
                self.status = "No task selected".into();
                return;
            }
        };
        match self.api.toggle_task(id, &mut self.notices) {
            Ok(updated) => {
                self.status = format!("#{} is now {}", id, updated.status.label());
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
                    *slot = updated;
                }
                self.select_task(id);
            }
            Err(err) => self.status = format!("Toggle failed: {}", err),
        }
    }

    fn column_tasks(&self, column: usize) -> Vec<&Task> {
        let status = Status::ALL[column.min(Status::ALL.len() - 1)];
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    fn current_task(&self) -> Option<&Task> {
        self.column_tasks(self.selected_column)
            .get(self.selected_row)
            .copied()
    }

    fn select_task(&mut self, task_id: TaskId) {
        for column in 0..Status::ALL.len() {
            if let Some(row) = self
                .column_tasks(column)
                .iter()
                .position(|t| t.id == task_id)
            {
                self.selected_column = column;
                self.selected_row = row;
                return;
            }
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.column_tasks(self.selected_column).len();
        self.selected_row = self.selected_row.min(len.saturating_sub(1));
    }

    fn prev_column(&mut self) {
        if self.selected_column > 0 {
            self.selected_column -= 1;
            self.clamp_selection();
        }
    }

    fn next_column(&mut self) {
        if self.selected_column + 1 < Status::ALL.len() {
            self.selected_column += 1;
            self.clamp_selection();
        }
    }

    fn prev_row(&mut self) {
        self.selected_row = self.selected_row.saturating_sub(1);
    }

    fn next_row(&mut self) {
        if self.selected_row + 1 < self.column_tasks(self.selected_column).len() {
            self.selected_row += 1;
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_board(f, layout[1]);
        self.draw_footer(f, layout[2]);
        self.draw_banners(f);

        let modals: Vec<Modal> = self.modals.iter().cloned().collect();
        for modal in &modals {
            match (modal.kind, modal.form) {
                (ModalKind::ConfirmDelete(id), _) => self.draw_confirm(f, id),
                (_, Some(slot)) => draw_form(f, &self.forms[slot]),
                _ => {}
            }
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let mut spans = vec![
            Span::styled(
                "taskdesk",
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(self.server.clone(), Style::default().fg(Color::DarkGray)),
            Span::raw("  "),
        ];
        for status in Status::ALL {
            let count = self.tasks.iter().filter(|t| t.status == status).count();
            spans.push(Span::styled(
                format!("{} {}  ", status.label(), count),
                Style::default().fg(status.tone().color()),
            ));
        }
        let synced = match self.last_sync {
            Some(at) => format!("synced {}", format_elapsed(at)),
            None => "not synced".to_string(),
        };
        spans.push(Span::styled(synced, Style::default().fg(Color::DarkGray)));
        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(header, area);
    }

    fn draw_board(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![
                Constraint::Ratio(1, Status::ALL.len() as u32);
                Status::ALL.len()
            ])
            .split(area);
        let today = Local::now().date_naive();
        let mut hits = Vec::new();

        for (idx, status) in Status::ALL.iter().enumerate() {
            let area = columns[idx];
            let focused = idx == self.selected_column;
            let block = Block::default()
                .title(Span::styled(
                    format!(" {} ", status.label()),
                    Style::default()
                        .fg(status.tone().color())
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(if focused {
                    status.tone().color()
                } else {
                    Color::DarkGray
                }));
            let inner = block.inner(area);
            f.render_widget(block, area);

            let tasks = self.column_tasks(idx);
            let viewport = inner.height as usize;
            let selected = if focused { self.selected_row } else { 0 };
            let offset = adjust_offset(
                selected,
                self.scroll_offsets[idx],
                viewport,
                1,
                tasks.len(),
            );
            let mut items = Vec::new();
            for (row, task) in tasks.iter().enumerate().skip(offset).take(viewport) {
                let y = inner.y + (row - offset) as u16;
                hits.push((Rect::new(inner.x, y, inner.width, 1), task.id));
                items.push(task_item(
                    task,
                    inner.width as usize,
                    focused && row == self.selected_row,
                    self.drag.is_dragging(task.id),
                    today,
                ));
            }
            if items.is_empty() {
                items.push(ListItem::new(Line::from(Span::styled(
                    "(empty)",
                    Style::default().fg(Color::DarkGray),
                ))));
            }
            f.render_widget(List::new(items), inner);
            self.scroll_offsets[idx] = offset;
        }
        self.row_hits = hits;
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone()).wrap(Wrap { trim: true });
        f.render_widget(status, bottom[0]);

        let detail = match self.current_task() {
            Some(task) => selected_task_detail(task),
            None => Line::from("No task selected"),
        };
        f.render_widget(Paragraph::new(detail).wrap(Wrap { trim: true }), bottom[1]);
    }

    fn draw_banners(&self, f: &mut ratatui::Frame<'_>) {
        let screen = f.size();
        let width = 44.min(screen.width);
        let mut y = screen.y + 1;
        for banner in self.notices.visible().iter().rev() {
            if y + 3 > screen.bottom() {
                break;
            }
            let area = Rect::new(screen.right().saturating_sub(width + 1), y, width, 3);
            let color = banner.tone.color();
            let widget = Paragraph::new(Line::from(vec![
                Span::styled(banner.message.clone(), Style::default().fg(color)),
                Span::styled("  x", Style::default().fg(Color::DarkGray)),
            ]))
            .block(
                Block::default()
                    .title(Span::styled(
                        banner.tone.label(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            );
            f.render_widget(Clear, area);
            f.render_widget(widget, area);
            y += 3;
        }
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: TaskId) {
        let area = centered_rect(50, 30, f.size());
        let title = self
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.title.clone())
            .unwrap_or_else(|| format!("#{}", task_id));
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", title),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn draw_form(f: &mut ratatui::Frame<'_>, form: &Form) {
    let area = centered_rect(70, 70, f.size());
    let mut lines = Vec::new();
    for (idx, field) in form.fields().iter().enumerate() {
        lines.extend(field_lines(field, form.focus_index() == Some(idx)));
    }
    lines.push(Line::from(""));
    let submit_style = if form.submit.is_busy() {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC)
    } else {
        Style::default()
            .fg(Color::Black)
            .bg(Color::LightCyan)
            .add_modifier(Modifier::BOLD)
    };
    lines.push(Line::from(vec![
        Span::styled(format!(" {} ", form.submit.display_label()), submit_style),
        Span::styled(
            "  Ctrl+Enter to save • Esc to cancel • Tab/Shift-Tab to move • ←→ change choice",
            Style::default().fg(Color::Gray),
        ),
    ]));
    let dialog = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    form.title.clone(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    // Without the enhancement Ctrl+Enter arrives as a bare Enter. Terminals
    // that ignore it still submit with Enter on any single-line field.
    if supports_keyboard_enhancement().unwrap_or(false) {
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        );
    }
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let _ = execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags);
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x && column < rect.right() && row >= rect.y && row < rect.bottom()
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn footer_help_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("←↑↓→ / h j k l", Style::default().fg(Color::LightCyan)),
        Span::raw(" move  "),
        Span::styled("Ctrl+N/n", Style::default().fg(Color::LightMagenta)),
        Span::raw(" new  "),
        Span::styled("e", Style::default().fg(Color::LightYellow)),
        Span::raw(" edit  "),
        Span::styled("space", Style::default().fg(Color::LightGreen)),
        Span::raw(" advance  "),
        Span::styled("c", Style::default().fg(Color::LightMagenta)),
        Span::raw(" category  "),
        Span::styled("d", Style::default().fg(Color::LightRed)),
        Span::raw(" delete  "),
        Span::styled("r", Style::default().fg(Color::LightCyan)),
        Span::raw(" refresh  "),
        Span::styled("x", Style::default().fg(Color::Gray)),
        Span::raw(" dismiss  "),
        Span::styled("q", Style::default().fg(Color::LightRed)),
        Span::raw(" quit"),
    ])
}

fn task_item(
    task: &Task,
    width: usize,
    selected: bool,
    dragging: bool,
    today: chrono::NaiveDate,
) -> ListItem<'static> {
    let due = due_label(task.due_day(), today);
    let marker = if dragging { "⇅ " } else { "" };
    let mut spans = vec![
        Span::styled(format!("{}#{} ", marker, task.id), Style::default().fg(Color::DarkGray)),
        Span::styled(
            truncate_text(&task.title, width.saturating_sub(24).max(8)),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            task.priority.as_str(),
            Style::default().fg(task.priority.tone().color()),
        ),
    ];
    if task.due_day().is_some() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            due.text,
            Style::default().fg(due.tone.unwrap_or(Tone::Secondary).color()),
        ));
    }
    let mut style = Style::default().fg(Color::Gray);
    if selected {
        style = style.bg(Color::Rgb(40, 44, 56));
    }
    if dragging {
        style = style.add_modifier(Modifier::DIM | Modifier::ITALIC);
    }
    ListItem::new(Line::from(spans)).style(style)
}

fn field_lines(field: &Field, active: bool) -> Vec<Line<'static>> {
    let invalid = field.is_invalid();
    let label_style = Style::default()
        .fg(if invalid { Color::LightRed } else { Color::Gray })
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let marker = if field.spec.required { "*" } else { "" };
    let prefix = format!("{}{}: ", field.spec.label, marker);
    let spacer = " ".repeat(prefix.chars().count());
    let text = match &field.spec.kind {
        FieldKind::Password => "•".repeat(field.value.value.chars().count()),
        FieldKind::Select(_) => format!("< {} >", field.display_value()),
        _ if active => field.value.with_caret(),
        _ => field.value.value.clone(),
    };
    let segments: Vec<&str> = if text.is_empty() {
        vec![""]
    } else {
        text.split('\n').collect()
    };
    let mut lines: Vec<Line<'static>> = segments
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style,
                ),
                Span::styled((*line).to_string(), value_style),
            ])
        })
        .collect();
    if let Some(annotation) = &field.annotation {
        lines.push(Line::from(vec![
            Span::raw(spacer),
            Span::styled(
                annotation.message.clone(),
                Style::default().fg(Color::LightRed),
            ),
        ]));
    }
    lines
}

fn selected_task_detail(task: &Task) -> Line<'static> {
    let mut spans = vec![Span::styled(
        task.title.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        task.status.label(),
        Style::default().fg(task.status.tone().color()),
    ));
    if let Some(category) = &task.category_name {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("@{}", category),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    if let Some(body) = task.description.as_deref().filter(|d| !d.is_empty()) {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            body.to_string(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosave::NAMESPACE_KEY;
    use crate::config::ApiConfig;
    use crate::storage::MemoryStore;

    fn app() -> App<MemoryStore> {
        let api = ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
        })
        .unwrap();
        App::new(AppContext {
            api,
            autosave: AutoSave::load(
                MemoryStore::default(),
                NAMESPACE_KEY,
                Duration::from_millis(1000),
            ),
            timing: TimingConfig::default(),
            server: "http://127.0.0.1:9".into(),
        })
    }

    fn press(app: &mut App<MemoryStore>, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        let quit = app.handle_key(KeyEvent::new(code, modifiers), now).unwrap();
        assert!(!quit);
    }

    fn type_text(app: &mut App<MemoryStore>, text: &str, now: Instant) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch), KeyModifiers::NONE, now);
        }
    }

    /// Opens the add-task modal and waits out the focus delay.
    fn open_add_task(app: &mut App<MemoryStore>, now: Instant) -> Instant {
        press(app, KeyCode::Char('n'), KeyModifiers::CONTROL, now);
        let focused = now + Duration::from_millis(100);
        app.tick(focused);
        assert!(app.forms[ADD_FORM].has_focus());
        focused
    }

    #[test]
    fn invalid_submit_leaves_control_enabled() {
        let mut app = app();
        let now = open_add_task(&mut app, Instant::now());

        press(&mut app, KeyCode::Enter, KeyModifiers::CONTROL, now);

        let form = &app.forms[ADD_FORM];
        assert!(!form.submit.is_busy());
        assert!(app.pending_submit.is_none());
        assert!(form.field("title").unwrap().is_invalid());
        assert!(app.modals.is_open());
    }

    #[test]
    fn busy_form_ignores_a_second_submit() {
        let mut app = app();
        let now = open_add_task(&mut app, Instant::now());
        type_text(&mut app, "Buy milk", now);

        press(&mut app, KeyCode::Enter, KeyModifiers::NONE, now);
        assert!(app.forms[ADD_FORM].submit.is_busy());
        assert_eq!(app.forms[ADD_FORM].submit.display_label(), "Processing...");
        assert_eq!(app.pending_submit.take(), Some(ADD_FORM));

        press(&mut app, KeyCode::Enter, KeyModifiers::CONTROL, now);
        assert!(app.pending_submit.is_none());
        assert_eq!(app.status, "Still processing the last submit");

        app.tick(now + Duration::from_millis(3000));
        assert!(!app.forms[ADD_FORM].submit.is_busy());
    }

    #[test]
    fn ctrl_enter_submits_from_the_description() {
        let mut app = app();
        let now = open_add_task(&mut app, Instant::now());
        type_text(&mut app, "Plan trip", now);
        press(&mut app, KeyCode::Tab, KeyModifiers::NONE, now);

        press(&mut app, KeyCode::Enter, KeyModifiers::NONE, now);
        assert_eq!(app.forms[ADD_FORM].value("description"), Some("\n"));
        assert!(app.pending_submit.is_none());

        press(&mut app, KeyCode::Enter, KeyModifiers::CONTROL, now);
        assert_eq!(app.pending_submit, Some(ADD_FORM));
        assert_eq!(app.forms[ADD_FORM].value("description"), Some("\n"));
    }

    #[test]
    fn escape_resets_form_and_clears_annotations() {
        let mut app = app();
        let now = open_add_task(&mut app, Instant::now());
        press(&mut app, KeyCode::Enter, KeyModifiers::CONTROL, now);
        type_text(&mut app, "half typed", now);

        press(&mut app, KeyCode::Esc, KeyModifiers::NONE, now);

        let form = &app.forms[ADD_FORM];
        assert!(!app.modals.is_open());
        assert_eq!(form.value("title"), Some(""));
        assert_eq!(form.annotations().count(), 0);
        assert!(!form.has_focus());
    }

    #[test]
    fn ctrl_n_does_not_stack_add_task_modals() {
        let mut app = app();
        let now = Instant::now();
        press(&mut app, KeyCode::Char('n'), KeyModifiers::CONTROL, now);
        press(&mut app, KeyCode::Char('n'), KeyModifiers::CONTROL, now);
        assert_eq!(app.modals.iter().count(), 1);
    }

    #[test]
    fn loaded_categories_fill_task_selects() {
        let mut app = app();
        app.set_categories(vec![Category {
            id: 5,
            name: "Errands".into(),
            color: None,
        }]);
        let field = app.forms[EDIT_FORM].field_mut("category_id").unwrap();
        assert!(field.cycle_option(true));
        assert_eq!(field.value.value, "5");
        assert_eq!(field.display_value(), "Errands");
    }

    #[test]
    fn offset_follows_selection() {
        assert_eq!(adjust_offset(0, 0, 5, 1, 20), 0);
        assert_eq!(adjust_offset(10, 0, 5, 1, 20), 7);
        assert_eq!(adjust_offset(2, 7, 5, 1, 20), 1);
        assert_eq!(adjust_offset(19, 0, 5, 1, 20), 15);
        assert_eq!(adjust_offset(3, 4, 0, 1, 20), 0);
    }

    #[test]
    fn hit_testing_is_half_open() {
        let rect = Rect::new(2, 3, 10, 1);
        assert!(contains(rect, 2, 3));
        assert!(contains(rect, 11, 3));
        assert!(!contains(rect, 12, 3));
        assert!(!contains(rect, 5, 4));
    }

    #[test]
    fn annotations_render_under_their_field() {
        let mut form = add_task_form();
        validate(&mut form);
        let title = form.field("title").unwrap();
        let lines = field_lines(title, false);
        assert_eq!(lines.len(), 2);
        let rendered: String = lines[1].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(rendered.contains("This field is required"));
    }
}
