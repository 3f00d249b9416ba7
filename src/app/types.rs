use std::fmt;

use super::dashboard::{BarrelStatus, TopSearchEntry};
use super::pagination::ResultItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Search,
    IndexSubmit,
}

impl Mode {
    pub fn toggle(self) -> Self {
        match self {
            Mode::Search => Mode::IndexSubmit,
            Mode::IndexSubmit => Mode::Search,
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Mode::Search => "Search...",
            Mode::IndexSubmit => "Enter URL...",
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Mode::Search => "search",
            Mode::IndexSubmit => "url",
        }
    }
}

/// One user action on the primary field. Lives until the action is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Search { query: String },
    Urls { url: String },
    Admin,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Search { .. } => "/search",
            Route::Urls { .. } => "/urls",
            Route::Admin => "/admin",
        }
    }

    pub fn query_param(&self) -> Option<(&'static str, &str)> {
        match self {
            Route::Search { query } => Some(("query", query.as_str())),
            Route::Urls { url } => Some(("url", url.as_str())),
            Route::Landing | Route::Admin => None,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Route::Landing => "googol".to_string(),
            Route::Search { query } => format!("Results for \"{query}\""),
            Route::Urls { url } => format!("Pages linking to {url}"),
            Route::Admin => "Admin dashboard".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    BarrelUpdates,
    SearchUpdates,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::BarrelUpdates, Topic::SearchUpdates];

    pub fn name(self) -> &'static str {
        match self {
            Topic::BarrelUpdates => "barrelUpdates",
            Topic::SearchUpdates => "searchUpdates",
        }
    }

    pub fn destination(self) -> String {
        format!("/topic/{}", self.name())
    }

    pub fn from_destination(destination: &str) -> Option<Self> {
        let name = destination.strip_prefix("/topic/")?;
        Topic::ALL.into_iter().find(|topic| topic.name() == name)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Failure,
}

impl NoticeKind {
    pub fn title(self) -> &'static str {
        match self {
            NoticeKind::Info => "Notice",
            NoticeKind::Failure => "Error",
        }
    }
}

/// Blocking notification. The draw loop ignores input until it is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Failure,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAction {
    SubmitUrl(String),
    RequestIngestion(String),
    FetchAdvice,
}

impl RemoteAction {
    pub fn label(&self) -> &'static str {
        match self {
            RemoteAction::SubmitUrl(_) => "submit_url",
            RemoteAction::RequestIngestion(_) => "request_ingestion",
            RemoteAction::FetchAdvice => "fetch_advice",
        }
    }
}

#[derive(Debug)]
pub enum PageDocument {
    Landing,
    Results {
        items: Vec<ResultItem>,
        sentinel: Option<String>,
    },
    Admin {
        barrels: Vec<BarrelStatus>,
        searches: Vec<TopSearchEntry>,
    },
}

/// State of the push session behind an admin view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushLink {
    Connecting,
    Live,
    Down,
}

impl PushLink {
    pub fn label(self) -> &'static str {
        match self {
            PushLink::Connecting => "connecting",
            PushLink::Live => "live",
            PushLink::Down => "disconnected",
        }
    }
}

#[derive(Debug)]
pub enum AppEvent {
    PageLoaded {
        route: Route,
        document: PageDocument,
    },
    PageFailed {
        route: Route,
        notice: Notice,
    },
    /// Reported by the push task identified by `session`.
    PushLink {
        session: u64,
        link: PushLink,
        message: String,
    },
    Notice(Notice),
    Status(String),
}
