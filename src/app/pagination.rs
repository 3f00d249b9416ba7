pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// A pre-rendered result entry. The view toggles its visibility and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultItem {
    pub text: String,
    pub link: Option<String>,
    visibility: Visibility,
}

impl ResultItem {
    pub fn new(text: impl Into<String>, link: Option<String>) -> Self {
        Self {
            text: text.into(),
            link,
            visibility: Visibility::Hidden,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl PageCursor {
    fn for_items(item_count: usize, page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size,
            total_pages: item_count.div_ceil(page_size),
        }
    }
}

#[derive(Debug)]
pub struct PaginationView {
    items: Vec<ResultItem>,
    cursor: Option<PageCursor>,
    label: String,
}

impl PaginationView {
    /// Pagination stays disabled, with every item hidden, when there are no
    /// items or the page carried a sentinel.
    pub fn new(mut items: Vec<ResultItem>, sentinel: Option<&str>) -> Self {
        for item in &mut items {
            item.visibility = Visibility::Hidden;
        }
        let cursor = if items.is_empty() || sentinel.is_some() {
            None
        } else {
            Some(PageCursor::for_items(items.len(), PAGE_SIZE))
        };
        let mut view = Self {
            items,
            cursor,
            label: String::new(),
        };
        if view.cursor.is_some() {
            view.show_page(1);
        }
        view
    }

    pub fn controls_enabled(&self) -> bool {
        self.cursor.is_some()
    }

    #[cfg(test)]
    pub fn current_page(&self) -> usize {
        self.cursor.map(|c| c.current_page).unwrap_or(0)
    }

    pub fn total_pages(&self) -> usize {
        self.cursor.map(|c| c.total_pages).unwrap_or(0)
    }

    pub fn page_label(&self) -> &str {
        &self.label
    }

    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn visible_items(&self) -> impl Iterator<Item = &ResultItem> {
        self.items.iter().filter(|item| item.is_visible())
    }

    pub fn visible_count(&self) -> usize {
        self.visible_items().count()
    }

    /// Shows the window of page `page`. Reached only through construction and
    /// `prev`/`next`, which keep the cursor on the same page.
    fn show_page(&mut self, page: usize) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let window = if page == 0 {
            0..0
        } else {
            let start = (page - 1).saturating_mul(cursor.page_size);
            start..start.saturating_add(cursor.page_size)
        };
        for (idx, item) in self.items.iter_mut().enumerate() {
            item.visibility = if window.contains(&idx) {
                Visibility::Visible
            } else {
                Visibility::Hidden
            };
        }
        self.label = format!("Page {page}");
    }

    pub fn prev(&mut self) -> bool {
        let Some(cursor) = self.cursor.as_mut() else {
            return false;
        };
        if cursor.current_page <= 1 {
            return false;
        }
        cursor.current_page -= 1;
        let page = cursor.current_page;
        self.show_page(page);
        true
    }

    pub fn next(&mut self) -> bool {
        let Some(cursor) = self.cursor.as_mut() else {
            return false;
        };
        if cursor.current_page >= cursor.total_pages {
            return false;
        }
        cursor.current_page += 1;
        let page = cursor.current_page;
        self.show_page(page);
        true
    }
}
