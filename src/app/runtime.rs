use std::fs::OpenOptions;
use std::io;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use super::config::Cli;
use super::dashboard::LiveDashboard;
use super::dispatch::RemoteActionDispatcher;
use super::error::PageError;
use super::page::Navigator;
use super::push::{AbortTaskOnDrop, PushSession, PushSubscriptions, run_push_session};
use super::state::{AppState, Effect, PushConnection};
use super::tui::draw_loop;
use super::types::{AppEvent, Notice, PageDocument, PushLink, Route};

fn init_logging(log_file: &str) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("googol=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(io::Error::other)
}

fn page_failure_notice(route: &Route, err: &PageError) -> Notice {
    match err {
        PageError::Status(status) => Notice::failure(format!(
            "Could not load {} (HTTP {}).",
            route.path(),
            status.as_u16()
        )),
        PageError::Transport(_) => {
            Notice::failure("Could not reach the server. Gateway may be down.")
        }
        PageError::Address(_) => Notice::failure(err.to_string()),
    }
}

/// Background side of the draw loop. Every effect runs on its own task and
/// reports back through the event channel.
pub struct Services {
    navigator: Navigator,
    dispatcher: RemoteActionDispatcher,
    push_url: Url,
    next_session: AtomicU64,
    tx: UnboundedSender<AppEvent>,
}

impl Services {
    pub fn new(
        navigator: Navigator,
        dispatcher: RemoteActionDispatcher,
        push_url: Url,
        tx: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            navigator,
            dispatcher,
            push_url,
            next_session: AtomicU64::new(1),
            tx,
        }
    }

    pub fn execute(&self, state: &mut AppState, effect: Effect) -> ControlFlow<()> {
        match effect {
            Effect::Quit => return ControlFlow::Break(()),
            Effect::Load(route) => self.spawn_load(route),
            Effect::Dispatch(action) => {
                let dispatcher = self.dispatcher.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let event = match dispatcher.perform(&action).await {
                        Some(notice) => AppEvent::Notice(notice),
                        None => AppEvent::Status(format!("{} failed, see log", action.label())),
                    };
                    let _ = tx.send(event);
                });
            }
            Effect::OpenPush => state.attach_push(self.open_push()),
        }
        ControlFlow::Continue(())
    }

    fn spawn_load(&self, route: Route) {
        let navigator = self.navigator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = match navigator.load(&route).await {
                Ok(document) => AppEvent::PageLoaded { route, document },
                Err(err) => {
                    warn!(path = route.path(), error = %err, "page load failed");
                    let notice = page_failure_notice(&route, &err);
                    AppEvent::PageFailed { route, notice }
                }
            };
            let _ = tx.send(event);
        });
    }

    fn open_push(&self) -> PushConnection {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (subscriptions, senders) = PushSubscriptions::channel();
        let endpoint = self.push_url.clone();
        let tx = self.tx.clone();
        let _ = tx.send(AppEvent::Status(format!(
            "connecting to push channel at {endpoint}"
        )));
        let report = move |link: PushLink, message: String| {
            let _ = tx.send(AppEvent::PushLink {
                session: id,
                link,
                message,
            });
        };
        let handle = tokio::spawn(async move {
            let session = match PushSession::connect(&endpoint).await {
                Ok(session) => session,
                Err(err) => {
                    warn!(session = id, error = %err, "push channel unavailable");
                    report(PushLink::Down, format!("push channel unavailable: {err}"));
                    return;
                }
            };
            report(PushLink::Live, "push channel subscribed".to_string());
            let message = match session.run(senders).await {
                Ok(()) => "push channel closed".to_string(),
                Err(err) => {
                    warn!(session = id, error = %err, "push session ended");
                    format!("push channel lost: {err}")
                }
            };
            report(PushLink::Down, message);
        });
        PushConnection::new(id, subscriptions, AbortTaskOnDrop(handle.abort_handle()))
    }
}

fn http_client() -> io::Result<Client> {
    Client::builder()
        .user_agent(concat!("googol/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(io::Error::other)
}

pub async fn run() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;
    let base = cli.server_url()?;
    let push_url = cli.push_url(&base)?;
    info!(server = %base, push = %push_url, "starting");

    let client = http_client()?;
    let navigator = Navigator::new(client.clone(), base.clone());
    let dispatcher = RemoteActionDispatcher::new(client, base);

    if cli.no_tui {
        return run_headless(&navigator, &push_url).await;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let services = Services::new(navigator, dispatcher, push_url, tx);
    let mut state = AppState::new(cli.index_submit.into());
    if cli.admin {
        if let Some(effect) = state.navigate(Route::Admin) {
            let _ = services.execute(&mut state, effect);
        }
    }

    run_tui(&mut state, &services, &mut rx)
}

fn print_dashboard(dashboard: &LiveDashboard) {
    eprintln!("{}\n", dashboard.barrels_table().to_plain_text());
    eprintln!("{}\n", dashboard.searches_table().to_plain_text());
}

async fn run_headless(navigator: &Navigator, push_url: &Url) -> io::Result<()> {
    let mut dashboard = match navigator.load(&Route::Admin).await {
        Ok(PageDocument::Admin { barrels, searches }) => {
            LiveDashboard::with_snapshot(barrels, searches)
        }
        Ok(_) => LiveDashboard::default(),
        Err(err) => {
            warn!(error = %err, "admin snapshot unavailable");
            eprintln!("admin snapshot unavailable: {err}");
            LiveDashboard::default()
        }
    };
    print_dashboard(&dashboard);

    let (mut subscriptions, senders) = PushSubscriptions::channel();
    let endpoint = push_url.clone();
    let session = tokio::spawn(async move { run_push_session(&endpoint, senders).await });
    eprintln!("listening for dashboard updates on {push_url}");

    while let Some((topic, payload)) = subscriptions.recv_any().await {
        if dashboard.handle_message(topic, &payload) {
            eprintln!("{}\n", dashboard.table(topic).to_plain_text());
        } else if let Some(status) = dashboard.status_messages().next() {
            eprintln!("{status}");
        }
    }

    match session.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            eprintln!("push channel lost: {err}");
            Err(io::Error::other(err))
        }
        Err(err) => Err(io::Error::other(err)),
    }
}

fn run_tui(
    state: &mut AppState,
    services: &Services,
    rx: &mut UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let tui_result = draw_loop(&mut terminal, state, services, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tui_result
}
