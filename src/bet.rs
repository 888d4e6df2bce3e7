//! Bet records and the batched source that feeds the submission engine.
//!
//! Records come from a CSV file with five fields per line (first name, last
//! name, national ID, birth date, chosen number). On the wire each record is
//! rendered as `clientId:first:last:id:birth:number` and records of one batch
//! are joined by `;`, so neither character may appear inside a field.
use crate::error::{ClientError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Separator between the fields of one bet on the wire.
pub const FIELD_SEP: char = ':';
/// Separator between bets of one batch on the wire.
pub const BET_SEP: char = ';';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetRecord {
    pub first_name: String,
    pub last_name: String,
    /// National ID; together with `number` identifies the bet in logs.
    pub document: String,
    pub birthdate: String,
    pub number: String,
}

impl BetRecord {
    /// Build a record from the five CSV fields of line `line` (1-based).
    pub fn from_fields(line: usize, fields: &[&str]) -> Result<Self> {
        let [first, last, document, birthdate, number] = fields else {
            return Err(ClientError::InvalidRecord {
                line,
                reason: format!("expected 5 fields, found {}", fields.len()),
            });
        };
        for f in fields {
            if f.contains(FIELD_SEP) || f.contains(BET_SEP) {
                return Err(ClientError::InvalidRecord {
                    line,
                    reason: format!("field {f:?} contains '{FIELD_SEP}' or '{BET_SEP}'"),
                });
            }
        }
        Ok(Self {
            first_name: first.to_string(),
            last_name: last.to_string(),
            document: document.to_string(),
            birthdate: birthdate.to_string(),
            number: number.to_string(),
        })
    }

    /// `clientId:first:last:id:birth:number`
    pub fn to_wire(&self, client_id: &str) -> String {
        [
            client_id,
            &self.first_name,
            &self.last_name,
            &self.document,
            &self.birthdate,
            &self.number,
        ]
        .join(":")
    }
}

/// Render a whole batch as one `BET` payload.
pub fn encode_batch(client_id: &str, bets: &[BetRecord]) -> String {
    bets.iter()
        .map(|b| b.to_wire(client_id))
        .collect::<Vec<_>>()
        .join(";")
}

/// Finite sequence of bets handed out in bounded batches.
pub trait BetSource {
    /// Up to `max` records in source order, plus whether any records remain.
    fn next_batch(&mut self, max: usize) -> Result<(Vec<BetRecord>, bool)>;
}

/// CSV-backed [`BetSource`]. Blank lines are skipped.
///
/// One record is read ahead so `has_more` is exact: a source whose length is a
/// multiple of the batch size never yields a trailing empty batch.
pub struct BetReader<R> {
    lines: Lines<R>,
    line: usize,
    ahead: Option<BetRecord>,
    path: Option<PathBuf>,
}

impl<R: BufRead> BetReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line: 0, ahead: None, path: None }
    }

    fn read_record(&mut self) -> Result<Option<BetRecord>> {
        for next in self.lines.by_ref() {
            self.line += 1;
            let raw = next.map_err(ClientError::SourceIo)?;
            let raw = raw.trim_end_matches('\r');
            if raw.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
            return BetRecord::from_fields(self.line, &fields).map(Some);
        }
        Ok(None)
    }
}

impl BetReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(ClientError::SourceIo)?;
        let mut reader = Self::new(BufReader::new(file));
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Start over from the first record of the file.
    pub fn rewind(&mut self) -> Result<()> {
        if let Some(path) = self.path.clone() {
            *self = Self::open(path)?;
        }
        Ok(())
    }
}

impl<R: BufRead> BetSource for BetReader<R> {
    fn next_batch(&mut self, max: usize) -> Result<(Vec<BetRecord>, bool)> {
        let max = max.max(1);
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            let next = match self.ahead.take() {
                Some(rec) => Some(rec),
                None => self.read_record()?,
            };
            match next {
                Some(rec) => batch.push(rec),
                None => return Ok((batch, false)),
            }
        }
        self.ahead = self.read_record()?;
        let has_more = self.ahead.is_some();
        Ok((batch, has_more))
    }
}
