//! Adjacency table describing the network's parent/child edges.
//!
//! On disk the table is a square delimited grid:
//!
//! ```text
//! ,A,B,C
//! A,0,1,0
//! B,0,0,1
//! C,0,0,0
//! ```
//!
//! A nonzero cell at (row `r`, column `c`) makes `r` a parent of `c`.

use std::collections::VecDeque;
use std::path::Path;

use bn_common::{Error, Result};
use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::data::reader::{csv_error, delimiter_byte};

const TABLE_ORIGIN: &str = "<adjacency table>";

/// Square 0/1 parent matrix over an ordered list of variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyTable {
    labels: Vec<String>,
    /// `matrix[parent][child]`
    matrix: Vec<Vec<bool>>,
}

impl AdjacencyTable {
    /// A table over `labels` with no edges.
    pub fn empty(labels: Vec<String>) -> Self {
        let n = labels.len();
        AdjacencyTable {
            labels,
            matrix: vec![vec![false; n]; n],
        }
    }

    /// Build a table from `(parent, child)` pairs.
    pub fn from_edges<P, C>(labels: Vec<String>, edges: impl IntoIterator<Item = (P, C)>) -> Result<Self>
    where
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut table = AdjacencyTable::empty(labels);
        for (parent, child) in edges {
            table.add_edge(parent.as_ref(), child.as_ref())?;
        }
        Ok(table)
    }

    /// Mark `parent` as a parent of `child`.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<()> {
        let p = self.index_of(parent)?;
        let c = self.index_of(child)?;
        if p == c {
            return Err(Error::MalformedStructure(format!(
                "'{}' cannot be its own parent",
                parent
            )));
        }
        self.matrix[p][c] = true;
        Ok(())
    }

    /// Parse the grid format. Blank lines are ignored and cells are trimmed;
    /// labels may be quoted.
    pub fn parse(text: &str, delimiter: char) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter_byte(delimiter)?)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        let header = records
            .next()
            .ok_or_else(|| Error::MalformedStructure("empty adjacency table".to_string()))?
            .map_err(|e| csv_error(TABLE_ORIGIN, e))?;
        let labels: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        if labels.is_empty() {
            return Err(Error::MalformedStructure(
                "adjacency header lists no variables".to_string(),
            ));
        }
        for (idx, label) in labels.iter().enumerate() {
            if label.is_empty() || labels[..idx].contains(label) {
                return Err(Error::MalformedStructure(format!(
                    "invalid or duplicate column label '{}'",
                    label
                )));
            }
        }

        let n = labels.len();
        let mut matrix = vec![vec![false; n]; n];
        let mut seen_rows = 0usize;
        for (row, record) in records.enumerate() {
            let record = record.map_err(|e| csv_error(TABLE_ORIGIN, e))?;
            if row >= n {
                return Err(Error::MalformedStructure(format!(
                    "more rows than the {} variables in the header",
                    n
                )));
            }
            let row_label = record.get(0).unwrap_or_default();
            if row_label != labels[row] {
                return Err(Error::MalformedStructure(format!(
                    "row {} is labelled '{}' but the header expects '{}'",
                    row + 1,
                    row_label,
                    labels[row]
                )));
            }
            let cells: Vec<&str> = record.iter().skip(1).collect();
            if cells.len() != n {
                return Err(Error::MalformedStructure(format!(
                    "row '{}' has {} cells, expected {}",
                    row_label,
                    cells.len(),
                    n
                )));
            }
            for (col, cell) in cells.iter().enumerate() {
                let value: i64 = cell.parse().map_err(|_| {
                    Error::MalformedStructure(format!(
                        "cell ({}, {}) is not an integer: '{}'",
                        row_label, labels[col], cell
                    ))
                })?;
                matrix[row][col] = value != 0;
            }
            seen_rows += 1;
        }
        if seen_rows != n {
            return Err(Error::MalformedStructure(format!(
                "expected {} rows, found {}",
                n, seen_rows
            )));
        }

        Ok(AdjacencyTable { labels, matrix })
    }

    /// Read and parse a table file.
    pub fn read(path: &Path, delimiter: char) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::SourceUnavailable {
            origin: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, delimiter)
    }

    /// Render in the grid format, one line per row, trailing newline included.
    /// Labels containing the delimiter or a quote are quoted.
    pub fn render(&self, delimiter: char) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter_byte(delimiter)?)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        let header = std::iter::once("").chain(self.labels.iter().map(String::as_str));
        writer
            .write_record(header)
            .map_err(|e| csv_error(TABLE_ORIGIN, e))?;
        for (label, row) in self.labels.iter().zip(&self.matrix) {
            let cells = row.iter().map(|&cell| if cell { "1" } else { "0" });
            writer
                .write_record(std::iter::once(label.as_str()).chain(cells))
                .map_err(|e| csv_error(TABLE_ORIGIN, e))?;
        }

        let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| Error::MalformedStructure(e.to_string()))
    }

    /// Write the grid format to `path`.
    pub fn write(&self, path: &Path, delimiter: char) -> Result<()> {
        std::fs::write(path, self.render(delimiter)?)?;
        Ok(())
    }

    /// Variables in table order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// All `(parent, child)` edges, row-major.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (p, row) in self.matrix.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                if cell {
                    out.push((self.labels[p].as_str(), self.labels[c].as_str()));
                }
            }
        }
        out
    }

    /// Parents of `child` in table order.
    pub fn parents_of(&self, child: &str) -> Result<Vec<&str>> {
        let c = self.index_of(child)?;
        Ok(self
            .matrix
            .iter()
            .enumerate()
            .filter(|(_, row)| row[c])
            .map(|(p, _)| self.labels[p].as_str())
            .collect())
    }

    /// Children of `parent` in table order.
    pub fn children_of(&self, parent: &str) -> Result<Vec<&str>> {
        let p = self.index_of(parent)?;
        Ok(self.matrix[p]
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell)
            .map(|(c, _)| self.labels[c].as_str())
            .collect())
    }

    /// A topological order of the labels, or `MalformedStructure` on a cycle.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        let n = self.labels.len();
        let mut indegree: Vec<usize> = (0..n)
            .map(|c| (0..n).filter(|&p| self.matrix[p][c]).count())
            .collect();
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(p) = ready.pop_front() {
            order.push(self.labels[p].as_str());
            for c in 0..n {
                if self.matrix[p][c] {
                    indegree[c] -= 1;
                    if indegree[c] == 0 {
                        ready.push_back(c);
                    }
                }
            }
        }

        if order.len() != n {
            let stuck: Vec<&str> = (0..n)
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.labels[i].as_str())
                .collect();
            return Err(Error::MalformedStructure(format!(
                "cycle through {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Check acyclicity.
    pub fn validate(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    fn index_of(&self, label: &str) -> Result<usize> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| Error::unknown_variable(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_and_renders_the_grid() {
        let text = ",A,B,C\nA,0,1,0\nB,0,0,1\nC,0,0,0\n";
        let table = AdjacencyTable::parse(text, ',').unwrap();
        assert_eq!(table.labels(), &labels(&["A", "B", "C"])[..]);
        assert_eq!(table.edges(), vec![("A", "B"), ("B", "C")]);
        assert_eq!(table.parents_of("C").unwrap(), vec!["B"]);
        assert_eq!(table.children_of("A").unwrap(), vec!["B"]);
        assert_eq!(table.render(',').unwrap(), text);
    }

    #[test]
    fn any_nonzero_integer_is_an_edge() {
        let table = AdjacencyTable::parse(",A,B\r\nA,0,2\r\nB,0,0\r\n", ',').unwrap();
        assert_eq!(table.edges(), vec![("A", "B")]);
    }

    #[test]
    fn rejects_mislabelled_rows() {
        let err = AdjacencyTable::parse(",A,B\nB,0,0\nA,0,0\n", ',').unwrap_err();
        assert!(matches!(err, Error::MalformedStructure(_)));
    }

    #[test]
    fn rejects_ragged_and_missing_rows() {
        assert!(AdjacencyTable::parse(",A,B\nA,0\nB,0,0\n", ',').is_err());
        assert!(AdjacencyTable::parse(",A,B\nA,0,1\n", ',').is_err());
        assert!(AdjacencyTable::parse(",A,B\nA,0,x\nB,0,0\n", ',').is_err());
        assert!(AdjacencyTable::parse("", ',').is_err());
    }

    #[test]
    fn quoted_labels_survive_parse_and_render() {
        let table = AdjacencyTable::from_edges(
            labels(&["age, years", "say \"hi\"", "C"]),
            [("age, years", "C"), ("say \"hi\"", "C")],
        )
        .unwrap();
        let text = table.render(',').unwrap();
        assert!(text.starts_with(",\"age, years\",\"say \"\"hi\"\"\",C\n"));
        let parsed = AdjacencyTable::parse(&text, ',').unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.parents_of("C").unwrap(), vec!["age, years", "say \"hi\""]);
    }

    #[test]
    fn cells_are_trimmed() {
        let table = AdjacencyTable::parse(" , A , B\n A , 0 , 1\n B , 0 , 0\n", ',').unwrap();
        assert_eq!(table.edges(), vec![("A", "B")]);
    }

    #[test]
    fn detects_cycles() {
        let table =
            AdjacencyTable::from_edges(labels(&["A", "B", "C"]), [("A", "B"), ("B", "C"), ("C", "A")])
                .unwrap();
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn topological_order_puts_parents_first() {
        let table =
            AdjacencyTable::from_edges(labels(&["C", "B", "A"]), [("A", "B"), ("B", "C")]).unwrap();
        assert_eq!(table.topological_order().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn from_edges_rejects_unknown_and_self_edges() {
        assert!(matches!(
            AdjacencyTable::from_edges(labels(&["A"]), [("A", "Z")]),
            Err(Error::UnknownVariable { .. })
        ));
        assert!(matches!(
            AdjacencyTable::from_edges(labels(&["A"]), [("A", "A")]),
            Err(Error::MalformedStructure(_))
        ));
    }
}
