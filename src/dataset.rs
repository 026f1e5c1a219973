use crate::cell::CellValue;

/// One record: ordered `(column, value)` pairs.
///
/// Blank source cells are simply not present, which is how "missing" is told
/// apart from a cell that holds an explicit value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Row { cells: Vec::new() }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Sets a value, replacing an existing column in place or appending a new one.
    pub fn set(&mut self, column: &str, value: CellValue) {
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.set(column, value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(&column, value);
        }
        row
    }
}

/// Header plus rows, as read from (or written to) the first sheet of a workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularDataset {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let mut dataset = TabularDataset { columns, rows: Vec::new() };
        for row in rows {
            dataset.push_row(row);
        }
        dataset
    }

    /// Appends a row, extending the header with any column not seen before.
    pub fn push_row(&mut self, row: Row) {
        for (name, _) in row.iter() {
            self.ensure_column(name);
        }
        self.rows.push(row);
    }

    pub fn ensure_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut row = Row::new()
            .with("x", 1.0)
            .with("latitud", "old")
            .with("y", 2.0);
        row.set("latitud", CellValue::Number(10.0));

        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x", "latitud", "y"]);
        assert_eq!(row.get("latitud"), Some(&CellValue::Number(10.0)));
    }

    #[test]
    fn test_missing_column() {
        let row = Row::new().with("x", 1.0);
        assert!(row.get("zona").is_none());
        assert!(!row.contains("zona"));
    }

    #[test]
    fn test_dataset_header_is_union_in_first_seen_order() {
        let dataset = TabularDataset::new(
            vec!["x".to_string(), "y".to_string()],
            vec![
                Row::new().with("x", 1.0).with("y", 2.0),
                Row::new().with("x", 1.0).with("nota", "a"),
            ],
        );
        assert_eq!(dataset.columns, vec!["x", "y", "nota"]);
        assert_eq!(dataset.len(), 2);
    }
}
