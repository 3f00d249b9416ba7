use std::io;

use clap::{Parser, ValueEnum};
use url::Url;

use super::input::IndexSubmitRoute;
use super::push::endpoint_for;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "googol",
    version,
    about = "Terminal front-end for the googol search engine with a live admin dashboard"
)]
pub struct Cli {
    #[arg(
        long,
        env = "GOOGOL_SERVER",
        value_name = "URL",
        default_value = "http://localhost:8080"
    )]
    pub server: String,

    /// WebSocket endpoint of the push channel. Derived from `--server` when unset.
    #[arg(long, env = "GOOGOL_PUSH", value_name = "URL")]
    pub push: Option<String>,

    #[arg(
        long,
        env = "GOOGOL_INDEX_SUBMIT",
        value_enum,
        default_value_t = IndexSubmitArg::Navigate
    )]
    pub index_submit: IndexSubmitArg,

    #[arg(
        long,
        env = "GOOGOL_LOG_FILE",
        value_name = "FILE",
        default_value = "googol.log"
    )]
    pub log_file: String,

    #[arg(long, default_value_t = false)]
    pub admin: bool,

    #[arg(long, default_value_t = false)]
    pub no_tui: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum IndexSubmitArg {
    Navigate,
    Dispatch,
}

impl From<IndexSubmitArg> for IndexSubmitRoute {
    fn from(value: IndexSubmitArg) -> Self {
        match value {
            IndexSubmitArg::Navigate => IndexSubmitRoute::Navigate,
            IndexSubmitArg::Dispatch => IndexSubmitRoute::Dispatch,
        }
    }
}

impl Cli {
    pub fn server_url(&self) -> io::Result<Url> {
        let url = Url::parse(self.server.trim()).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid --server URL {}: {err}", self.server),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("--server must be http or https, got {}", url.scheme()),
            ));
        }
        Ok(url)
    }

    pub fn push_url(&self, server: &Url) -> io::Result<Url> {
        let Some(raw) = self.push.as_deref() else {
            return endpoint_for(server).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no push endpoint for {server}"),
                )
            });
        };
        let url = Url::parse(raw.trim()).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid --push URL {raw}: {err}"),
            )
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("--push must be ws or wss, got {}", url.scheme()),
            ));
        }
        Ok(url)
    }
}
