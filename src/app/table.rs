use ratatui::layout::Constraint;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};

/// A record that can be laid out as one table row.
pub trait TableRow {
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

/// Rendered snapshot of a record sequence. Rebuilt from scratch on each
/// update, so the rows always mirror the source slice exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn from_rows<T: TableRow>(title: impl Into<String>, records: &[T]) -> Self {
        Self {
            title: title.into(),
            headers: T::HEADERS.to_vec(),
            rows: records.iter().map(TableRow::cells).collect(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn widget(&self, focused: bool) -> Table<'_> {
        let column_count = self.headers.len().max(1) as u32;
        let widths = vec![Constraint::Ratio(1, column_count); self.headers.len()];
        let rows = self.rows.iter().map(|cells| {
            Row::new(
                cells
                    .iter()
                    .map(|cell| Cell::from(cell.as_str()))
                    .collect::<Vec<_>>(),
            )
        });
        Table::new(rows, widths)
            .header(
                Row::new(self.headers.clone())
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(
                Block::default()
                    .title(format!("{} ({})", self.title, self.rows.len()))
                    .borders(Borders::ALL)
                    .border_style(if focused {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    }),
            )
            .column_spacing(1)
    }

    pub fn to_plain_text(&self) -> String {
        let mut out = format!("{}\n{}", self.title, self.headers.join("\t"));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join("\t"));
        }
        out
    }
}
