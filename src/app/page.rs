use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::info;
use url::Url;

use super::dashboard::{BarrelStatus, TopSearchEntry};
use super::error::PageError;
use super::pagination::ResultItem;
use super::types::{PageDocument, Route};

/// Fixed strings the server renders in place of results to signal an empty
/// or failed lookup.
pub const SENTINELS: [&str; 5] = [
    "No results found.",
    "No barrels available.",
    "Error occurred during search.",
    "Error occurred getting sub links.",
    "Invalid URL.",
];

pub fn sentinel_of(text: &str) -> Option<&'static str> {
    let text = text.trim();
    SENTINELS.into_iter().find(|sentinel| *sentinel == text)
}

fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn parse_results_page(html: &str) -> PageDocument {
    let doc = Html::parse_document(html);

    let sentinel = match Selector::parse("#results, .results, .message") {
        Ok(sel) => doc
            .select(&sel)
            .find_map(|el| sentinel_of(&element_text(&el)))
            .map(str::to_string),
        Err(_) => None,
    };

    let items = match (Selector::parse(".resultItem"), Selector::parse("a[href]")) {
        (Ok(item_sel), Ok(link_sel)) => doc
            .select(&item_sel)
            .map(|el| {
                let link = el
                    .select(&link_sel)
                    .find_map(|a| a.value().attr("href"))
                    .map(str::to_string);
                ResultItem::new(element_text(&el), link)
            })
            .collect(),
        _ => Vec::new(),
    };

    PageDocument::Results { items, sentinel }
}

fn table_cells(row: ElementRef<'_>, cell_sel: &Selector) -> Vec<String> {
    row.select(cell_sel).map(|cell| element_text(&cell)).collect()
}

pub fn parse_admin_page(html: &str) -> PageDocument {
    let doc = Html::parse_document(html);
    let (Ok(barrel_rows), Ok(search_rows), Ok(cell_sel)) = (
        Selector::parse("#barrels-table-body tr"),
        Selector::parse("#searches-table-body tr"),
        Selector::parse("td"),
    ) else {
        return PageDocument::Admin {
            barrels: Vec::new(),
            searches: Vec::new(),
        };
    };

    let barrels = doc
        .select(&barrel_rows)
        .filter_map(|row| {
            let mut cells = table_cells(row, &cell_sel).into_iter();
            Some(BarrelStatus {
                id: cells.next()?,
                last_update_time: cells.next()?,
            })
        })
        .collect();

    let searches = doc
        .select(&search_rows)
        .filter_map(|row| {
            let mut cells = table_cells(row, &cell_sel).into_iter();
            let query = cells.next()?;
            let count = cells.next()?.parse::<u64>().ok()?;
            Some(TopSearchEntry { query, count })
        })
        .collect();

    PageDocument::Admin { barrels, searches }
}

/// Loads server-rendered views. Every navigation replaces the current view
/// with whatever this returns.
#[derive(Debug, Clone)]
pub struct Navigator {
    client: Client,
    base: Url,
}

impl Navigator {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    pub fn route_url(&self, route: &Route) -> Result<Url, PageError> {
        let mut url = self.base.join(route.path())?;
        if let Some((name, value)) = route.query_param() {
            url.query_pairs_mut().append_pair(name, value);
        }
        Ok(url)
    }

    pub async fn load(&self, route: &Route) -> Result<PageDocument, PageError> {
        if *route == Route::Landing {
            return Ok(PageDocument::Landing);
        }
        let url = self.route_url(route)?;
        info!(%url, "navigating");
        let res = self.client.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(PageError::Status(status));
        }
        let html = res.text().await?;
        Ok(match route {
            Route::Admin => parse_admin_page(&html),
            _ => parse_results_page(&html),
        })
    }
}
