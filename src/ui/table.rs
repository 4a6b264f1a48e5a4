use crate::ui::output::cell;
use crate::RowSet;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

/// Two-column metric table
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// Query result with one column per projected name
pub fn rows_table(rows: &RowSet) -> String {
    let mut builder = Builder::default();
    builder.push_record(rows.columns().iter().cloned());
    for row in rows {
        builder.push_record(row.values().iter().map(cell));
    }
    builder.build().with(Style::rounded()).to_string()
}
