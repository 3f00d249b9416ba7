use tracing::debug;

use super::types::{Mode, Notice, Query, RemoteAction, Route};
use super::validate::is_valid_url;

pub const INVALID_URL_MESSAGE: &str = "Invalid URL";

/// What a confirmed URL on the primary field leads to while in
/// [`Mode::IndexSubmit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSubmitRoute {
    #[default]
    Navigate,
    Dispatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    Primary,
    DirectIndex,
}

impl Field {
    pub fn cycle(self) -> Self {
        match self {
            Field::Primary => Field::DirectIndex,
            Field::DirectIndex => Field::Primary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Idle,
    Navigate(Route),
    Dispatch(RemoteAction),
    Rejected(Notice),
}

#[derive(Debug, Default)]
pub struct InputModeController {
    mode: Mode,
    submit_route: IndexSubmitRoute,
    focus: Field,
    primary: String,
    direct_index: String,
}

impl InputModeController {
    pub fn new(submit_route: IndexSubmitRoute) -> Self {
        Self {
            submit_route,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn placeholder(&self) -> &'static str {
        self.mode.placeholder()
    }

    pub fn indicator(&self) -> &'static str {
        self.mode.indicator()
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn primary_text(&self) -> &str {
        &self.primary
    }

    pub fn direct_index_text(&self) -> &str {
        &self.direct_index
    }

    pub fn toggle(&mut self) {
        self.mode = self.mode.toggle();
        debug!(mode = self.mode.indicator(), "input mode toggled");
    }

    pub fn cycle_focus(&mut self) {
        self.focus = self.focus.cycle();
    }

    pub fn insert_char(&mut self, ch: char) {
        self.focused_mut().push(ch);
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    pub fn clear_field(&mut self) {
        self.focused_mut().clear();
    }

    /// Confirms whichever field currently holds focus.
    pub fn confirm(&self) -> InputOutcome {
        match self.focus {
            Field::Primary => self.submit_on_enter(&self.primary),
            Field::DirectIndex => self.submit_direct_index(&self.direct_index),
        }
    }

    pub fn submit_on_enter(&self, text: &str) -> InputOutcome {
        let text = text.trim();
        if text.is_empty() {
            return InputOutcome::Idle;
        }
        let query = Query {
            text: text.to_string(),
            mode: self.mode,
        };
        match query.mode {
            Mode::Search => InputOutcome::Navigate(Route::Search { query: query.text }),
            Mode::IndexSubmit if !is_valid_url(&query.text) => {
                InputOutcome::Rejected(Notice::failure(INVALID_URL_MESSAGE))
            }
            Mode::IndexSubmit => match self.submit_route {
                IndexSubmitRoute::Navigate => InputOutcome::Navigate(Route::Urls { url: query.text }),
                IndexSubmitRoute::Dispatch => {
                    InputOutcome::Dispatch(RemoteAction::SubmitUrl(query.text))
                }
            },
        }
    }

    /// The direct-index field always carries a URL, whatever the mode.
    pub fn submit_direct_index(&self, text: &str) -> InputOutcome {
        let text = text.trim();
        if !is_valid_url(text) {
            return InputOutcome::Rejected(Notice::failure(INVALID_URL_MESSAGE));
        }
        InputOutcome::Dispatch(RemoteAction::SubmitUrl(text.to_string()))
    }

    pub fn open_admin(&self) -> InputOutcome {
        InputOutcome::Navigate(Route::Admin)
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Primary => &mut self.primary,
            Field::DirectIndex => &mut self.direct_index,
        }
    }
}
