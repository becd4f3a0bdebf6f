//! Tabular frequency store.
//!
//! Holds a categorical table in column-major form and answers the two
//! questions both inference and structure learning ask of the data:
//! which states does a variable take, and how often does each state occur
//! among the rows matching a conjunctive condition.

pub mod condition;
pub mod reader;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use bn_common::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::logging::targets;

pub use condition::Condition;
pub use reader::{DataSource, RecordReader};

/// One observation, keyed by column name.
pub type Record = BTreeMap<String, String>;

/// State counts of one variable over a set of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frequency {
    /// Count per state, over every state ever observed for the variable.
    pub counts: BTreeMap<String, u64>,
    /// Number of rows counted (or the pseudo-count sum after fallback).
    pub total: u64,
    /// Whether the uniform pseudo-count replaced an all-zero result.
    pub fallback: bool,
}

impl Frequency {
    /// `count / total` per state; all zeros when `total` is 0.
    pub fn distribution(&self) -> BTreeMap<String, f64> {
        self.counts
            .iter()
            .map(|(state, &count)| {
                let p = if self.total == 0 {
                    0.0
                } else {
                    count as f64 / self.total as f64
                };
                (state.clone(), p)
            })
            .collect()
    }

    /// Counts in state order, for scoring.
    pub fn count_vector(&self) -> Vec<u64> {
        self.counts.values().copied().collect()
    }
}

/// Column-major categorical table with a unique-state cache.
#[derive(Debug)]
pub struct FrequencyStore {
    source: DataSource,
    delimiter: char,
    columns: Vec<String>,
    values: HashMap<String, Vec<String>>,
    rows: usize,
    /// Rows pulled from the stream so far (loaded or read).
    consumed: usize,
    stream: Option<RecordReader>,
    unique_cache: RefCell<HashMap<String, Vec<String>>>,
}

impl FrequencyStore {
    /// Create an unloaded store over `source` with a comma delimiter.
    pub fn open(source: impl Into<DataSource>) -> Self {
        FrequencyStore {
            source: source.into(),
            delimiter: ',',
            columns: Vec::new(),
            values: HashMap::new(),
            rows: 0,
            consumed: 0,
            stream: None,
            unique_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Use `delimiter` instead of a comma.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Build and fully load a store from in-memory text.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut store = FrequencyStore::open(DataSource::Inline(text.to_string()));
        store.load(None)?;
        Ok(store)
    }

    /// Read the header and up to `row_limit` rows (all rows when `None`).
    ///
    /// Always starts from the top of the source. When the limit stops the
    /// load early the stream stays open so [`read`](Self::read) continues
    /// with the next row. Returns the number of rows loaded.
    pub fn load(&mut self, row_limit: Option<usize>) -> Result<usize> {
        self.reset_from_source()?;

        let limit = row_limit.unwrap_or(usize::MAX);
        let mut exhausted = false;
        while self.rows < limit {
            let next = match self.stream.as_mut() {
                Some(stream) => stream.next_record()?,
                None => None,
            };
            match next {
                Some(fields) => {
                    self.push_fields(fields);
                    self.consumed += 1;
                }
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        if exhausted {
            self.stream = None;
        }

        info!(
            target: targets::DATA,
            origin = %self.source.origin(),
            rows = self.rows,
            columns = self.columns.len(),
            streaming = self.stream.is_some(),
            "data loaded"
        );
        Ok(self.rows)
    }

    /// Discard loaded rows and cache, and rewind the stream to the first data row.
    pub fn reload(&mut self) -> Result<()> {
        self.reset_from_source()?;
        debug!(target: targets::DATA, origin = %self.source.origin(), "data reloaded");
        Ok(())
    }

    /// Pull the next row from the stream without adding it to the table.
    pub fn read(&mut self) -> Result<Record> {
        let next = match self.stream.as_mut() {
            Some(stream) => stream.next_record()?,
            None => None,
        };
        let Some(fields) = next else {
            self.stream = None;
            return Err(Error::SourceExhausted {
                rows: self.consumed,
            });
        };
        self.consumed += 1;
        Ok(self.columns.iter().cloned().zip(fields).collect())
    }

    /// Add a row to the in-memory table.
    ///
    /// The record must have a value for every column and no others. The
    /// unique-state cache is dropped as a whole.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        if let Some(extra) = record.keys().find(|k| !self.values.contains_key(*k)) {
            return Err(Error::unknown_variable(extra.clone()));
        }
        let mut fields = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = record
                .get(column)
                .ok_or_else(|| Error::unknown_variable(column.clone()))?;
            fields.push(value.clone());
        }
        self.push_fields(fields);
        self.unique_cache.borrow_mut().clear();
        Ok(())
    }

    /// Column names in header order.
    pub fn variables(&self) -> &[String] {
        &self.columns
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.values.contains_key(variable)
    }

    /// Number of rows held in memory.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Whether rows remain to be pulled with [`read`](Self::read).
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Distinct values of `variable` in first-seen order.
    pub fn unique_states(&self, variable: &str) -> Result<Vec<String>> {
        if let Some(hit) = self.unique_cache.borrow().get(variable) {
            return Ok(hit.clone());
        }
        let column = self.column(variable)?;
        let mut states: Vec<String> = Vec::new();
        for value in column {
            if !states.contains(value) {
                states.push(value.clone());
            }
        }
        self.unique_cache
            .borrow_mut()
            .insert(variable.to_string(), states.clone());
        Ok(states)
    }

    /// Count the states of `variable` over the rows matching `condition`.
    ///
    /// Every state ever observed for `variable` appears in the result, with 0
    /// where it does not occur among the matching rows. An empty condition
    /// counts all rows. With `uniform_fallback`, a result whose counts are
    /// all zero is replaced by a count of 1 per state.
    pub fn frequency(
        &self,
        variable: &str,
        condition: &Condition,
        uniform_fallback: bool,
    ) -> Result<Frequency> {
        let target = self.column(variable)?;
        let matching = self.matching_rows(condition)?;

        let mut counts: BTreeMap<String, u64> = self
            .unique_states(variable)?
            .into_iter()
            .map(|s| (s, 0))
            .collect();

        let total = match &matching {
            None => {
                for value in target {
                    if let Some(c) = counts.get_mut(value) {
                        *c += 1;
                    }
                }
                self.rows as u64
            }
            Some(rows) => {
                for &row in rows {
                    if let Some(c) = counts.get_mut(&target[row]) {
                        *c += 1;
                    }
                }
                rows.len() as u64
            }
        };

        let mut freq = Frequency {
            counts,
            total,
            fallback: false,
        };
        if uniform_fallback && !freq.counts.is_empty() && freq.counts.values().all(|&c| c == 0) {
            for c in freq.counts.values_mut() {
                *c = 1;
            }
            freq.total = freq.counts.len() as u64;
            freq.fallback = true;
        }
        Ok(freq)
    }

    /// Row indices satisfying every term, or `None` for the empty condition.
    ///
    /// The first term scans its column once; later terms only filter the
    /// surviving indices.
    fn matching_rows(&self, condition: &Condition) -> Result<Option<Vec<usize>>> {
        let mut rows: Option<Vec<usize>> = None;
        for (variable, value) in condition.iter() {
            let column = self.column(variable)?;
            if !self.unique_states(variable)?.iter().any(|s| s == value) {
                return Err(Error::unknown_state(variable, value));
            }
            rows = Some(match rows {
                None => column
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| *v == value)
                    .map(|(idx, _)| idx)
                    .collect(),
                Some(mut survivors) => {
                    survivors.retain(|&idx| column[idx] == value);
                    survivors
                }
            });
        }
        Ok(rows)
    }

    fn column(&self, variable: &str) -> Result<&Vec<String>> {
        self.values
            .get(variable)
            .ok_or_else(|| Error::unknown_variable(variable))
    }

    fn push_fields(&mut self, fields: Vec<String>) {
        for (column, value) in self.columns.iter().zip(fields) {
            if let Some(col) = self.values.get_mut(column) {
                col.push(value);
            }
        }
        self.rows += 1;
    }

    fn reset_from_source(&mut self) -> Result<()> {
        let (stream, header) = RecordReader::open(&self.source, self.delimiter)?;
        self.values = header.iter().map(|h| (h.clone(), Vec::new())).collect();
        self.columns = header;
        self.rows = 0;
        self.consumed = 0;
        self.stream = Some(stream);
        self.unique_cache.borrow_mut().clear();
        Ok(())
    }
}
