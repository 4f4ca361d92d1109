use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use taskdesk::api::ApiClient;
use taskdesk::autosave::{AutoSave, AutoSaveStore};
use taskdesk::config::{config_path_override, default_config_path, Config};
use taskdesk::form::add_task_form;
use taskdesk::model::{Priority, Status, Task, TaskDraft};
use taskdesk::notify::Notifications;
use taskdesk::storage::{self, FileStore, KeyValueStore};
use taskdesk::ui;
use taskdesk::util::due_label;
use taskdesk::validation::{validate, Verdict};
use tracing::info;

pub struct Environment {
    pub config: Config,
    pub data_dir: PathBuf,
}

pub fn load_environment(server: Option<String>) -> Result<Environment> {
    let path = match config_path_override() {
        Some(path) => path,
        None => default_config_path(&storage::config_dir()?),
    };
    let mut config = Config::load(&path)?;
    config.apply_env();
    if let Some(server) = server {
        config.api.base_url = server;
    }
    let data_dir = match &config.storage.data_dir {
        Some(dir) => dir.clone(),
        None => storage::data_dir()?,
    };
    Ok(Environment { config, data_dir })
}

impl Environment {
    fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.config.api).context("building HTTP client")
    }

    fn store(&self) -> FileStore {
        FileStore::open(storage::storage_path(&self.data_dir))
    }
}

pub fn list(env: &Environment, status: Option<String>) -> Result<()> {
    let filter = match status.as_deref() {
        Some(raw) => Some(Status::parse(raw).ok_or_else(|| anyhow!("unknown status: {}", raw))?),
        None => None,
    };
    let client = env.client()?;
    let mut notices = quiet_notices();
    let tasks = client
        .list_tasks(filter, &mut notices)
        .map_err(|err| report(&notices, err.into()))?;
    let today = Local::now().date_naive();
    for status in Status::ALL {
        if filter.is_some_and(|f| f != status) {
            continue;
        }
        let column: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
        println!("{}", status.label());
        if column.is_empty() {
            println!("  (empty)");
        }
        for task in column {
            print_task(task, today);
        }
        println!();
    }
    Ok(())
}

pub fn add(
    env: &Environment,
    title: String,
    description: Option<String>,
    priority: Option<String>,
    due: Option<String>,
    category: Option<u64>,
) -> Result<()> {
    let mut form = add_task_form();
    form.set_value("title", &title);
    if let Some(description) = description {
        form.set_value("description", &description);
    }
    if let Some(priority) = priority {
        if Priority::parse(&priority).is_none() {
            bail!("unknown priority: {}", priority);
        }
        form.set_value("priority", &priority);
    }
    if let Some(due) = due {
        form.set_value("due_date", &due);
    }
    if let Some(category) = category {
        form.set_value("category_id", &category.to_string());
    }
    if let Verdict::Invalid(_) = validate(&mut form) {
        for (field, annotation) in form.annotations() {
            eprintln!("  {}: {}", field, annotation.message);
        }
        bail!("task not created");
    }

    let client = env.client()?;
    let mut notices = quiet_notices();
    let task = client
        .create_task(&TaskDraft::from_values(&form.snapshot()), &mut notices)
        .map_err(|err| report(&notices, err.into()))?;
    info!(task = task.id, "task created from the command line");
    println!("Added task #{}: {}", task.id, task.title);
    Ok(())
}

pub fn stats(env: &Environment) -> Result<()> {
    let client = env.client()?;
    let mut notices = quiet_notices();
    let stats = client
        .stats(&mut notices)
        .map_err(|err| report(&notices, err.into()))?;
    println!("total:       {}", stats.total_tasks);
    println!("pending:     {}", stats.pending_tasks);
    println!("in progress: {}", stats.in_progress_tasks);
    println!("completed:   {}", stats.completed_tasks);
    println!("overdue:     {}", stats.overdue_tasks);
    for (priority, count) in &stats.priority_distribution {
        println!("  {:<10} {}", priority, count);
    }
    Ok(())
}

pub fn drafts_show(env: &Environment) -> Result<()> {
    let store = env.store();
    let drafts = AutoSaveStore::parse(store.get(&env.config.storage.namespace).as_deref());
    if drafts.is_empty() {
        println!("No saved drafts");
        return Ok(());
    }
    for (form_id, snapshot) in drafts.iter() {
        println!("{}", form_id);
        for (name, value) in snapshot {
            println!("  {} = {:?}", name, value);
        }
    }
    Ok(())
}

pub fn drafts_clear(env: &Environment) -> Result<()> {
    let mut store = env.store();
    let removed = store
        .remove(&env.config.storage.namespace)
        .with_context(|| format!("updating {:?}", store.path()))?;
    if removed {
        println!("Cleared saved drafts");
    } else {
        println!("No saved drafts");
    }
    Ok(())
}

pub fn tui(env: &Environment) -> Result<()> {
    let autosave = AutoSave::load(
        env.store(),
        env.config.storage.namespace.clone(),
        env.config.timing.autosave_debounce(),
    );
    ui::run(ui::AppContext {
        api: env.client()?,
        autosave,
        timing: env.config.timing.clone(),
        server: env.config.api.base_url.clone(),
    })
}

/// Banners have nowhere to live outside the TUI; they are printed once.
fn quiet_notices() -> Notifications {
    Notifications::new(Duration::ZERO)
}

fn report(notices: &Notifications, err: anyhow::Error) -> anyhow::Error {
    for banner in notices.visible() {
        eprintln!("{}", banner.message);
    }
    err
}

fn print_task(task: &Task, today: chrono::NaiveDate) {
    print!("  - #{} [{}] {}", task.id, task.priority.as_str(), task.title);
    match &task.category_name {
        Some(category) => println!(" @{}", category),
        None => println!(),
    }
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        println!("    {}", description);
    }
    if task.due_day().is_some() {
        println!("    {}", due_label(task.due_day(), today).text);
    }
}
