use crate::config::Config;
use crate::error::{ApiError, SessionError, UpsellError};
use crate::fetch::{self, Fetched, Mutation, Payload, RequestTracker, Update};
use crate::guard::{guard, AuthPrompt, Route};
use crate::models::{
    AuthResponse, CheckoutSession, Credentials, NewProject, NewTask, Project, ProjectUpdate, Task,
    TaskUpdate, User,
};
use crate::parser::{parse_task_input, MAX_PRIORITY};
use crate::schedule::{self, DayBucket};
use crate::session::{LoadOutcome, Session};
use crate::upsell::{
    self, strip_marker, Browser, CheckoutReturn, SystemBrowser, Upsell, UpsellState,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Login,
    Register,
    AddTask,
    EditTask(String),
    NewProject,
    RenameProject(String),
}

#[derive(Debug)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
    pub secret: bool,
}

impl Field {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Field {
            label,
            value: value.into(),
            secret: false,
        }
    }

    fn secret(label: &'static str) -> Self {
        Field {
            label,
            value: String::new(),
            secret: true,
        }
    }
}

#[derive(Debug)]
pub struct Form {
    pub kind: FormKind,
    pub fields: Vec<Field>,
    pub active: usize,
    /// Set while the submitted values are on their way to the server.
    pub submitting: bool,
    /// The user has typed into the form since it opened.
    touched: bool,
}

impl Form {
    fn new(kind: FormKind, fields: Vec<Field>) -> Self {
        Form {
            kind,
            fields,
            active: 0,
            submitting: false,
            touched: false,
        }
    }

    fn login() -> Self {
        Form::new(
            FormKind::Login,
            vec![Field::new("Email", ""), Field::secret("Password")],
        )
    }

    fn register() -> Self {
        Form::new(
            FormKind::Register,
            vec![Field::new("Email", ""), Field::secret("Password")],
        )
    }

    fn add_task() -> Self {
        Form::new(FormKind::AddTask, vec![Field::new("Title (!1-!4 sets priority)", "")])
    }

    fn edit_task(task: &Task) -> Self {
        Form::new(
            FormKind::EditTask(task.id.clone()),
            vec![
                Field::new("Title", task.title.clone()),
                Field::new("Description", task.description.clone().unwrap_or_default()),
                Field::new("Priority (0-4)", task.priority.to_string()),
            ],
        )
    }

    fn new_project() -> Self {
        Form::new(FormKind::NewProject, vec![Field::new("Project name", "")])
    }

    fn rename_project(project: &Project) -> Self {
        Form::new(
            FormKind::RenameProject(project.id.clone()),
            vec![Field::new("Project name", project.name.clone())],
        )
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            FormKind::Login => "Sign in",
            FormKind::Register => "Create account",
            FormKind::AddTask => "New task",
            FormKind::EditTask(_) => "Edit task",
            FormKind::NewProject => "New project",
            FormKind::RenameProject(_) => "Rename project",
        }
    }

    fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    fn next_field(&mut self) {
        self.active = (self.active + 1) % self.fields.len();
    }

    fn previous_field(&mut self) {
        self.active = (self.active + self.fields.len() - 1) % self.fields.len();
    }

    fn push(&mut self, c: char) {
        if let Some(field) = self.fields.get_mut(self.active) {
            field.value.push(c);
            self.touched = true;
        }
    }

    fn pop(&mut self) {
        if let Some(field) = self.fields.get_mut(self.active) {
            field.value.pop();
            self.touched = true;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Confirm {
    DeleteTask { id: String, title: String },
    DeleteProject { id: String, name: String },
}

impl Confirm {
    pub fn question(&self) -> String {
        match self {
            Confirm::DeleteTask { title, .. } => format!("Delete task \"{}\"? (y/n)", title),
            Confirm::DeleteProject { name, .. } => {
                format!("Delete project \"{}\"? (y/n)", name)
            }
        }
    }
}

pub struct App {
    pub session: Session,
    pub config: Config,
    pub route: Route,
    pub prompt: AuthPrompt,
    pub tasks: Vec<Task>,
    pub upcoming: Vec<DayBucket>,
    pub projects: Vec<Project>,
    pub project: Option<Project>,
    pub state: ListState,
    pub loading: bool,
    pub input_mode: InputMode,
    pub form: Option<Form>,
    /// Inline message under the current view.
    pub status: Option<String>,
    /// Blocking message; any key dismisses it.
    pub alert: Option<String>,
    pub confirm: Option<Confirm>,
    pub upsell: Upsell,
    /// A checkout session has been requested and not answered yet.
    pub checkout_requested: bool,
    /// A success return waiting on the profile re-read.
    checkout_return: Option<CheckoutReturn>,
    tracker: RequestTracker,
    update_tx: UnboundedSender<Update>,
    update_rx: UnboundedReceiver<Update>,
    browser: Box<dyn Browser>,
}

impl App {
    pub fn new(session: Session, config: Config) -> App {
        App::with_browser(session, config, Box::new(SystemBrowser))
    }

    pub fn with_browser(session: Session, config: Config, browser: Box<dyn Browser>) -> App {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let upsell = Upsell::new(session.user());
        App {
            session,
            config,
            route: Route::Login,
            prompt: AuthPrompt::SignIn,
            tasks: Vec::new(),
            upcoming: Vec::new(),
            projects: Vec::new(),
            project: None,
            state: ListState::default(),
            loading: false,
            input_mode: InputMode::Editing,
            form: Some(Form::login()),
            status: None,
            alert: None,
            confirm: None,
            upsell,
            checkout_requested: false,
            checkout_return: None,
            tracker: RequestTracker::default(),
            update_tx,
            update_rx,
            browser,
        }
    }

    /// Picks the first screen from the result of loading the session.
    pub fn start(&mut self, outcome: LoadOutcome) {
        self.upsell.sync(self.session.user());
        match outcome {
            LoadOutcome::Anonymous => self.show_login(AuthPrompt::SignIn),
            LoadOutcome::Rejected(_) => self.show_login(AuthPrompt::Expired),
            LoadOutcome::Authenticated => self.navigate(Route::Today),
            LoadOutcome::Unreachable(err) => {
                self.navigate(Route::Today);
                self.status = Some(format!("Could not load your profile: {}", err.message()));
            }
        }
    }

    pub fn navigate(&mut self, route: Route) {
        let target = guard(route, self.session.has_token());
        if target == Route::Login {
            self.show_login(AuthPrompt::SignIn);
            return;
        }
        if target == Route::Register {
            self.show_register();
            return;
        }

        if target != self.route {
            self.status = None;
            self.tasks.clear();
            self.upcoming.clear();
            self.project = None;
            self.state.select(None);
        }
        self.route = target;
        self.form = None;
        self.confirm = None;
        self.input_mode = InputMode::Normal;
        self.reload();
    }

    fn show_login(&mut self, prompt: AuthPrompt) {
        self.tracker.cancel();
        self.loading = false;
        self.route = Route::Login;
        self.prompt = prompt;
        self.form = Some(Form::login());
        self.input_mode = InputMode::Editing;
        self.confirm = None;
    }

    fn show_register(&mut self) {
        self.tracker.cancel();
        self.route = Route::Register;
        self.prompt = AuthPrompt::SignIn;
        self.form = Some(Form::register());
        self.input_mode = InputMode::Editing;
    }

    /// Refetches everything the current view shows.
    pub fn reload(&mut self) {
        if !self.route.is_protected() {
            return;
        }
        let ticket = self.tracker.issue();
        self.loading = true;
        fetch::spawn(
            self.session.api().clone(),
            self.route.clone(),
            ticket,
            self.update_tx.clone(),
        );
    }

    /// Applies everything that finished in the background since the last
    /// frame.
    pub fn drain_fetches(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            self.apply_update(update);
        }
    }

    fn apply_update(&mut self, update: Update) {
        match update {
            Update::Loaded(fetched) => self.apply(fetched),
            Update::Mutated { mutation, result } => self.finish_mutation(mutation, result),
            Update::TaskDetail(result) => self.refresh_edit_form(result),
            Update::SignedIn(result) => self.finish_sign_in(result),
            Update::Profile(result) => self.finish_refresh(result),
            Update::Checkout(result) => self.finish_checkout_request(result),
        }
    }

    pub fn apply(&mut self, fetched: Fetched) {
        if !self.tracker.accept(fetched.ticket) || fetched.route != self.route {
            tracing::debug!(ticket = fetched.ticket, route = ?fetched.route, "dropping stale response");
            return;
        }
        self.loading = false;

        match fetched.result {
            Ok(Payload::Tasks(tasks)) => self.tasks = tasks,
            Ok(Payload::Upcoming(buckets)) => self.upcoming = buckets,
            Ok(Payload::Projects(projects)) => self.projects = projects,
            Ok(Payload::Project(project, tasks)) => {
                self.project = Some(project);
                self.tasks = tasks;
            }
            Err(err) => {
                self.tasks.clear();
                self.upcoming.clear();
                if matches!(self.route, Route::Projects) {
                    self.projects.clear();
                }
                self.report(err);
                return;
            }
        }
        self.clamp_selection();
    }

    /// Shows an API failure inline, or sends the user back to the login form
    /// when the token was refused.
    fn report(&mut self, err: ApiError) {
        if err.is_unauthorized() {
            tracing::info!("token rejected, asking for a new login");
            self.session.forget_user();
            self.upsell.sync(None);
            self.show_login(AuthPrompt::Expired);
        } else {
            tracing::warn!(status = ?err.status(), error = %err, "request failed");
            self.status = Some(err.message());
        }
    }

    fn report_session(&mut self, err: SessionError) {
        match err {
            SessionError::Api(err) => self.report(err),
            err => self.status = Some(format!("Could not save login: {}", err)),
        }
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        match self.route {
            Route::Upcoming => self.upcoming.iter().flat_map(|b| b.tasks.iter()).collect(),
            Route::Today | Route::Project(_) => self.tasks.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn list_len(&self) -> usize {
        match self.route {
            Route::Projects => self.projects.len(),
            _ => self.visible_tasks().len(),
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let index = self.state.selected()?;
        self.visible_tasks().get(index).copied()
    }

    pub fn selected_project(&self) -> Option<&Project> {
        match self.route {
            Route::Projects => self.projects.get(self.state.selected()?),
            Route::Project(_) => self.project.as_ref(),
            _ => None,
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.list_len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            Some(i) => Some(i),
            None => Some(0),
        };
        self.state.select(selected);
    }

    pub fn next(&mut self) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Handles one key press. Returns true when the app should quit.
    ///
    /// Never waits on the network: requests are spawned and their results
    /// arrive through [`App::drain_fetches`].
    pub async fn handle_input(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        if self.alert.is_some() {
            self.alert = None;
            return false;
        }

        if let Some(confirm) = self.confirm.take() {
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.run_confirmed(confirm);
            }
            return false;
        }

        match self.input_mode {
            InputMode::Editing => {
                self.handle_form_key(key);
                false
            }
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('1') => self.navigate(Route::Today),
            KeyCode::Char('2') => self.navigate(Route::Upcoming),
            KeyCode::Char('3') => self.navigate(Route::Projects),
            KeyCode::Char('j') | KeyCode::Down => self.next(),
            KeyCode::Char('k') | KeyCode::Up => self.previous(),
            KeyCode::Char('a') => self.open_add_form(),
            KeyCode::Char('e') => self.open_edit_form(),
            KeyCode::Enter => {
                if self.route == Route::Projects {
                    if let Some(project) = self.selected_project() {
                        let id = project.id.clone();
                        self.navigate(Route::Project(id));
                    }
                } else {
                    self.open_edit_form();
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected(),
            KeyCode::Char('d') => self.ask_delete(),
            KeyCode::Char('u') => self.upgrade(),
            KeyCode::Char('r') => self.refresh_session(),
            KeyCode::Char('L') => self.logout(),
            KeyCode::Esc => {
                if matches!(self.route, Route::Project(_)) {
                    self.navigate(Route::Projects);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            self.input_mode = InputMode::Normal;
            return;
        };

        match key.code {
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.pop(),
            KeyCode::Char('r')
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && matches!(form.kind, FormKind::Login | FormKind::Register) =>
            {
                self.status = None;
                if form.kind == FormKind::Login {
                    self.navigate(Route::Register);
                } else {
                    self.navigate(Route::Login);
                }
            }
            // shortcuts with Ctrl or Alt are not text
            KeyCode::Char(c) if key.modifiers.difference(KeyModifiers::SHIFT).is_empty() => {
                form.push(c)
            }
            KeyCode::Enter if !form.submitting => self.submit_form(),
            KeyCode::Esc => {
                if !matches!(form.kind, FormKind::Login | FormKind::Register) {
                    self.form = None;
                    self.input_mode = InputMode::Normal;
                }
            }
            _ => {}
        }
    }

    fn open_add_form(&mut self) {
        let form = match self.route {
            Route::Today | Route::Project(_) => Form::add_task(),
            Route::Projects => Form::new_project(),
            _ => return,
        };
        self.form = Some(form);
        self.input_mode = InputMode::Editing;
    }

    fn open_edit_form(&mut self) {
        let form = match self.route {
            Route::Projects | Route::Project(_) if self.selected_task().is_none() => {
                match self.selected_project() {
                    Some(project) => Form::rename_project(project),
                    None => return,
                }
            }
            _ => match self.selected_task() {
                Some(task) => Form::edit_task(task),
                None => return,
            },
        };
        if let FormKind::EditTask(id) = &form.kind {
            let api = self.session.api().clone();
            let id = id.clone();
            fetch::run(self.update_tx.clone(), async move {
                Update::TaskDetail(api.tasks().get(&id).await)
            });
        }
        self.form = Some(form);
        self.input_mode = InputMode::Editing;
    }

    /// Swaps in the server's copy of the task being edited, unless the user
    /// has already started typing.
    fn refresh_edit_form(&mut self, result: Result<Task, ApiError>) {
        let task = match result {
            Ok(task) => task,
            Err(err) => {
                self.report(err);
                return;
            }
        };
        let untouched = self.form.as_ref().is_some_and(|form| {
            form.kind == FormKind::EditTask(task.id.clone()) && !form.touched && !form.submitting
        });
        if untouched {
            self.form = Some(Form::edit_task(&task));
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_ref() else {
            return;
        };

        let started = match &form.kind {
            FormKind::Login | FormKind::Register => self.submit_credentials(),
            FormKind::AddTask => self.submit_new_task(),
            FormKind::EditTask(id) => {
                let id = id.clone();
                self.submit_task_edit(id)
            }
            FormKind::NewProject => self.submit_new_project(),
            FormKind::RenameProject(id) => {
                let id = id.clone();
                self.submit_project_rename(id)
            }
        };

        if started {
            if let Some(form) = self.form.as_mut() {
                form.submitting = true;
            }
        }
    }

    fn submit_credentials(&mut self) -> bool {
        let Some(form) = self.form.as_ref() else {
            return false;
        };
        let email = form.value(0).trim().to_string();
        let password = form.value(1).to_string();
        if email.is_empty() || password.is_empty() {
            self.status = Some("Email and password are required.".to_string());
            return false;
        }
        let registering = form.kind == FormKind::Register;
        if registering && password.chars().count() < MIN_PASSWORD_LEN {
            self.status = Some(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            ));
            return false;
        }

        let credentials = Credentials { email, password };
        let api = self.session.api().clone();
        fetch::run(self.update_tx.clone(), async move {
            let result = if registering {
                api.auth().register(&credentials).await
            } else {
                api.auth().login(&credentials).await
            };
            Update::SignedIn(result)
        });
        true
    }

    fn finish_sign_in(&mut self, result: Result<AuthResponse, ApiError>) {
        self.release_form();
        let auth = match result {
            Ok(auth) => auth,
            Err(err) => {
                // a 401 here means bad credentials, not an expired session
                self.status = Some(err.message());
                return;
            }
        };
        match self.session.sign_in(auth).map(|_| ()) {
            Ok(()) => {
                self.status = None;
                self.upsell.sync(self.session.user());
                self.navigate(Route::Today);
            }
            Err(err) => self.report_session(err),
        }
    }

    fn submit_new_task(&mut self) -> bool {
        let parsed = parse_task_input(self.form.as_ref().map(|f| f.value(0)).unwrap_or(""));
        if parsed.title.is_empty() {
            self.status = Some("Task title cannot be empty.".to_string());
            return false;
        }

        let mut task = NewTask::titled(parsed.title);
        task.priority = parsed.priority;
        match &self.route {
            Route::Today => task.due_date = Some(schedule::end_of_today()),
            Route::Project(id) => task.project_id = Some(id.clone()),
            _ => {}
        }
        self.start_mutation(Mutation::CreateTask(task));
        true
    }

    fn submit_task_edit(&mut self, id: String) -> bool {
        let Some(form) = self.form.as_ref() else {
            return false;
        };
        let title = form.value(0).trim().to_string();
        let description = form.value(1).trim().to_string();
        let priority = form.value(2).trim().parse::<i32>();
        if title.is_empty() {
            self.status = Some("Task title cannot be empty.".to_string());
            return false;
        }
        let priority = match priority {
            Ok(p) if (0..=MAX_PRIORITY).contains(&p) => p,
            _ => {
                self.status = Some(format!("Priority must be between 0 and {}.", MAX_PRIORITY));
                return false;
            }
        };

        let update = TaskUpdate {
            title: Some(title),
            description: Some(description),
            priority: Some(priority),
            ..Default::default()
        };
        self.start_mutation(Mutation::UpdateTask(id, update));
        true
    }

    fn submit_new_project(&mut self) -> bool {
        let name = self.form.as_ref().map(|f| f.value(0).trim()).unwrap_or("");
        if name.is_empty() {
            self.status = Some("Project name cannot be empty.".to_string());
            return false;
        }
        let project = NewProject {
            name: name.to_string(),
            color: None,
        };
        self.start_mutation(Mutation::CreateProject(project));
        true
    }

    fn submit_project_rename(&mut self, id: String) -> bool {
        let name = self.form.as_ref().map(|f| f.value(0).trim()).unwrap_or("");
        if name.is_empty() {
            self.status = Some("Project name cannot be empty.".to_string());
            return false;
        }
        let update = ProjectUpdate {
            name: Some(name.to_string()),
            color: None,
        };
        self.start_mutation(Mutation::UpdateProject(id, update));
        true
    }

    fn start_mutation(&mut self, mutation: Mutation) {
        tracing::debug!(?mutation, "sending mutation");
        fetch::mutate(self.session.api().clone(), mutation, self.update_tx.clone());
    }

    /// Lets the user edit a form again after its request came back.
    fn release_form(&mut self) {
        if let Some(form) = self.form.as_mut() {
            form.submitting = false;
        }
    }

    /// Closes the submitted form and refetches after a successful mutation,
    /// or reports the failure and keeps what was typed.
    fn finish_mutation(&mut self, mutation: Mutation, result: Result<(), ApiError>) {
        match result {
            Ok(()) => {
                if self.form.as_ref().is_some_and(|f| f.submitting) {
                    self.form = None;
                    self.input_mode = InputMode::Normal;
                }
                self.status = None;
                if let Mutation::DeleteProject(id) = &mutation {
                    if self.route == Route::Project(id.clone()) {
                        self.navigate(Route::Projects);
                        return;
                    }
                }
                self.reload();
            }
            Err(err) => {
                self.release_form();
                self.report(err);
            }
        }
    }

    pub fn toggle_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let id = task.id.clone();
        let update = TaskUpdate::status(task.status.toggled());
        self.start_mutation(Mutation::UpdateTask(id, update));
    }

    fn ask_delete(&mut self) {
        self.confirm = if let Some(task) = self.selected_task() {
            Some(Confirm::DeleteTask {
                id: task.id.clone(),
                title: task.title.clone(),
            })
        } else {
            self.selected_project().map(|p| Confirm::DeleteProject {
                id: p.id.clone(),
                name: p.name.clone(),
            })
        };
    }

    fn run_confirmed(&mut self, confirm: Confirm) {
        match confirm {
            Confirm::DeleteTask { id, .. } => self.start_mutation(Mutation::DeleteTask(id)),
            Confirm::DeleteProject { id, .. } => self.start_mutation(Mutation::DeleteProject(id)),
        }
    }

    pub fn upgrade(&mut self) {
        if self.session.user().is_none() || self.checkout_requested {
            return;
        }
        if self.session.is_premium() {
            self.status = Some("You already have premium.".to_string());
            return;
        }

        self.checkout_requested = true;
        self.status = Some("Starting checkout...".to_string());
        let api = self.session.api().clone();
        let return_url = self.config.return_url.clone();
        fetch::run(self.update_tx.clone(), async move {
            Update::Checkout(upsell::request_checkout(&api, &return_url).await)
        });
    }

    fn finish_checkout_request(&mut self, result: Result<CheckoutSession, ApiError>) {
        self.checkout_requested = false;
        let opened = result
            .map_err(UpsellError::from)
            .and_then(|session| self.upsell.open_checkout(session, self.browser.as_ref()));
        match opened {
            Ok(_) => {
                self.status = Some(
                    "Finish checkout in your browser, then press r to refresh.".to_string(),
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "checkout failed");
                self.status = None;
                self.alert = Some(format!(
                    "Could not start checkout, please try again later. ({})",
                    err
                ));
            }
        }
    }

    /// Re-reads the profile in the background, e.g. after paying in the
    /// browser.
    pub fn refresh_session(&mut self) {
        match self.session.begin_refresh() {
            Some(api) => fetch::run(self.update_tx.clone(), async move {
                Update::Profile(api.user().me().await)
            }),
            None => self.show_login(AuthPrompt::SignIn),
        }
    }

    fn finish_refresh(&mut self, result: Result<User, ApiError>) {
        let was_pending = self.upsell.state() == UpsellState::CheckoutPending;
        let outcome = self.session.apply_profile(result);
        let authenticated = outcome.is_authenticated();
        match outcome {
            LoadOutcome::Rejected(err) => {
                self.checkout_return = None;
                self.report(err);
                return;
            }
            LoadOutcome::Unreachable(err) => self.status = Some(err.message()),
            LoadOutcome::Anonymous | LoadOutcome::Authenticated => {}
        }

        match self.checkout_return.take() {
            Some(ret) => self.finish_checkout(ret),
            None => {
                self.upsell.sync(self.session.user());
                if was_pending && self.upsell.state() == UpsellState::Premium {
                    self.status = Some("Upgrade complete. Thanks for supporting us!".to_string());
                }
            }
        }
        if authenticated {
            self.reload();
        }
    }

    /// Handles a return URL from the billing provider. A success return
    /// re-reads the profile before the plan is settled.
    pub fn handle_callback(&mut self, url: &str) {
        let Some(ret) = CheckoutReturn::from_url(url) else {
            tracing::debug!(%url, "callback without upgrade marker");
            return;
        };
        tracing::info!(url = %strip_marker(url), ?ret, "handling checkout return");

        match ret {
            CheckoutReturn::Success => match self.session.begin_refresh() {
                Some(api) => {
                    self.checkout_return = Some(ret);
                    fetch::run(self.update_tx.clone(), async move {
                        Update::Profile(api.user().me().await)
                    });
                }
                None => self.finish_checkout(ret),
            },
            CheckoutReturn::Cancel => self.finish_checkout(ret),
        }
    }

    fn finish_checkout(&mut self, ret: CheckoutReturn) {
        let state = self.upsell.complete(self.session.user(), ret);
        self.status = match (ret, state) {
            (CheckoutReturn::Success, UpsellState::Premium) => {
                Some("Upgrade complete. Thanks for supporting us!".to_string())
            }
            (CheckoutReturn::Success, _) => {
                Some("Payment received; premium will appear once it is confirmed.".to_string())
            }
            (CheckoutReturn::Cancel, _) => Some("Checkout cancelled.".to_string()),
        };
    }

    pub fn logout(&mut self) {
        if let Err(err) = self.session.logout() {
            self.report_session(err);
            return;
        }
        self.tasks.clear();
        self.upcoming.clear();
        self.projects.clear();
        self.project = None;
        self.upsell.sync(None);
        self.status = None;
        self.navigate(Route::Today);
    }

    /// Waits for the next background result and applies it.
    #[cfg(test)]
    async fn settle(&mut self) {
        if let Some(update) = self.update_rx.recv().await {
            self.apply_update(update);
        }
    }
}
