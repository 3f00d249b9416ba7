use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, info};

use super::dashboard::LiveDashboard;
use super::input::{IndexSubmitRoute, InputModeController, InputOutcome};
use super::pagination::PaginationView;
use super::push::{AbortTaskOnDrop, PushSubscriptions};
use super::types::{AppEvent, Notice, PageDocument, PushLink, RemoteAction, Route};

/// Work the draw loop has to hand to a background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Load(Route),
    Dispatch(RemoteAction),
    OpenPush,
    Quit,
}

/// Live push session of an admin view. Dropping it ends the session.
#[derive(Debug)]
pub struct PushConnection {
    id: u64,
    link: PushLink,
    subscriptions: PushSubscriptions,
    _session: AbortTaskOnDrop,
}

impl PushConnection {
    pub fn new(id: u64, subscriptions: PushSubscriptions, session: AbortTaskOnDrop) -> Self {
        Self {
            id,
            link: PushLink::Connecting,
            subscriptions,
            _session: session,
        }
    }

    pub fn link(&self) -> PushLink {
        self.link
    }
}

#[derive(Debug)]
pub enum View {
    Landing,
    Results {
        route: Route,
        pagination: PaginationView,
        sentinel: Option<String>,
    },
    Admin {
        dashboard: LiveDashboard,
        connection: Option<PushConnection>,
    },
}

impl View {
    pub fn route(&self) -> Route {
        match self {
            View::Landing => Route::Landing,
            View::Results { route, .. } => route.clone(),
            View::Admin { .. } => Route::Admin,
        }
    }
}

pub struct AppState {
    submit_route: IndexSubmitRoute,
    pub input: InputModeController,
    pub view: View,
    pub notice: Option<Notice>,
    pub pending: Option<Route>,
    status_messages: VecDeque<String>,
}

impl AppState {
    pub fn new(submit_route: IndexSubmitRoute) -> Self {
        Self {
            submit_route,
            input: InputModeController::new(submit_route),
            view: View::Landing,
            notice: None,
            pending: None,
            status_messages: VecDeque::new(),
        }
    }

    pub fn push_status(&mut self, message: String) {
        self.status_messages.push_front(message);
        while self.status_messages.len() > 20 {
            self.status_messages.pop_back();
        }
    }

    pub fn latest_status(&self) -> Option<&str> {
        self.status_messages.front().map(String::as_str)
    }

    /// Starts a full view transition. The landing view is local and swaps in
    /// immediately; every other route is loaded in the background.
    pub fn navigate(&mut self, route: Route) -> Option<Effect> {
        info!(path = route.path(), "navigation requested");
        if route == Route::Landing {
            self.pending = None;
            self.replace_view(View::Landing);
            return None;
        }
        self.pending = Some(route.clone());
        Some(Effect::Load(route))
    }

    fn replace_view(&mut self, view: View) {
        self.input = InputModeController::new(self.submit_route);
        self.view = view;
    }

    fn apply_outcome(&mut self, outcome: InputOutcome) -> Option<Effect> {
        match outcome {
            InputOutcome::Idle => None,
            InputOutcome::Navigate(route) => self.navigate(route),
            InputOutcome::Dispatch(action) => Some(Effect::Dispatch(action)),
            InputOutcome::Rejected(notice) => {
                self.notice = Some(notice);
                None
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Effect> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Effect::Quit);
        }
        if self.notice.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.notice = None;
            }
            return None;
        }

        match &mut self.view {
            View::Landing => self.handle_landing_key(key),
            View::Results {
                route, pagination, ..
            } => match key.code {
                KeyCode::Left | KeyCode::Char('p') => {
                    pagination.prev();
                    None
                }
                KeyCode::Right | KeyCode::Char('n') => {
                    pagination.next();
                    None
                }
                KeyCode::Char('h') => match route {
                    Route::Search { query } => Some(Effect::Dispatch(
                        RemoteAction::RequestIngestion(query.clone()),
                    )),
                    _ => None,
                },
                KeyCode::Char('a') => match route {
                    Route::Search { .. } => Some(Effect::Dispatch(RemoteAction::FetchAdvice)),
                    _ => None,
                },
                KeyCode::Esc => self.navigate(Route::Landing),
                _ => None,
            },
            View::Admin { .. } => match key.code {
                KeyCode::Esc => self.navigate(Route::Landing),
                _ => None,
            },
        }
    }

    fn handle_landing_key(&mut self, key: KeyEvent) -> Option<Effect> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(Effect::Quit),
            KeyCode::Tab | KeyCode::BackTab => {
                self.input.cycle_focus();
                None
            }
            KeyCode::F(2) => {
                self.input.toggle();
                None
            }
            KeyCode::F(4) => {
                let outcome = self.input.open_admin();
                self.apply_outcome(outcome)
            }
            KeyCode::Enter => {
                let outcome = self.input.confirm();
                self.apply_outcome(outcome)
            }
            KeyCode::Backspace => {
                self.input.backspace();
                None
            }
            KeyCode::Char('u') if ctrl => {
                self.input.clear_field();
                None
            }
            KeyCode::Char(ch) if !ctrl => {
                self.input.insert_char(ch);
                None
            }
            _ => None,
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Option<Effect> {
        match event {
            AppEvent::PageLoaded { route, document } => {
                if self.pending.as_ref() != Some(&route) {
                    debug!(path = route.path(), "discarding superseded page load");
                    return None;
                }
                self.pending = None;
                match document {
                    PageDocument::Landing => {
                        self.replace_view(View::Landing);
                        None
                    }
                    PageDocument::Results { items, sentinel } => {
                        let pagination = PaginationView::new(items, sentinel.as_deref());
                        self.replace_view(View::Results {
                            route,
                            pagination,
                            sentinel,
                        });
                        None
                    }
                    PageDocument::Admin { barrels, searches } => {
                        self.replace_view(View::Admin {
                            dashboard: LiveDashboard::with_snapshot(barrels, searches),
                            connection: None,
                        });
                        Some(Effect::OpenPush)
                    }
                }
            }
            AppEvent::PageFailed { route, notice } => {
                if self.pending.as_ref() == Some(&route) {
                    self.pending = None;
                    self.notice = Some(notice);
                }
                None
            }
            AppEvent::Notice(notice) => {
                self.notice = Some(notice);
                None
            }
            AppEvent::Status(message) => {
                if let View::Admin { dashboard, .. } = &mut self.view {
                    dashboard.push_status(message.clone());
                }
                self.push_status(message);
                None
            }
            AppEvent::PushLink {
                session,
                link,
                message,
            } => {
                let current = match &mut self.view {
                    View::Admin {
                        dashboard,
                        connection: Some(connection),
                    } if connection.id == session => {
                        connection.link = link;
                        dashboard.push_status(message.clone());
                        true
                    }
                    _ => false,
                };
                if current {
                    self.push_status(message);
                } else {
                    debug!(session, "discarding event from a closed push session");
                }
                None
            }
        }
    }

    pub fn attach_push(&mut self, connection: PushConnection) {
        if let View::Admin {
            connection: slot, ..
        } = &mut self.view
        {
            *slot = Some(connection);
        }
    }

    pub fn drain_push(&mut self) {
        if let View::Admin {
            dashboard,
            connection: Some(connection),
        } = &mut self.view
        {
            dashboard.drain(&mut connection.subscriptions);
        }
    }
}
