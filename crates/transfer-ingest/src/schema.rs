//! Column schema for listing tables
//!
//! Maps each column position of the source table to a canonical field (or
//! drops it). Headers and row widths are checked against the schema so a
//! layout change on the site fails the page instead of shifting values into
//! the wrong fields.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use transfer_common::TransferRecord;

use crate::error::{IngestError, Result};
use crate::parser::RawRow;

/// Date layout used by the listing, after whitespace is removed
const SOURCE_DATE_FORMAT: &str = "%d.%m.%Y/%H:%M";

/// Canonical record fields a column can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Player name; the cell must carry the player's profile link
    Player,
    Date,
    Club,
    ContractType,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Player, Field::Date, Field::Club, Field::ContractType];
}

/// One column of the source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header label as shown by the source
    pub header: String,
    /// Field fed by this column; `None` drops the column
    pub field: Option<Field>,
}

impl ColumnSpec {
    pub fn mapped(header: impl Into<String>, field: Field) -> Self {
        Self {
            header: header.into(),
            field: Some(field),
        }
    }

    pub fn dropped(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            field: None,
        }
    }
}

/// Ordered column layout of a listing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Build a schema; every field must be mapped by exactly one column
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        for field in Field::ALL {
            let count = columns.iter().filter(|c| c.field == Some(field)).count();
            if count != 1 {
                return Err(IngestError::Config(format!(
                    "schema must map {:?} exactly once, found {}",
                    field, count
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Layout of the league transfer listing
    pub fn league_transfers() -> Self {
        Self {
            columns: vec![
                ColumnSpec::mapped("Date", Field::Date),
                ColumnSpec::mapped("Player", Field::Player),
                ColumnSpec::mapped("Club", Field::Club),
                ColumnSpec::dropped("Transfer Type"),
                ColumnSpec::mapped("Contract Type", Field::ContractType),
            ],
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Check a header row against the expected labels
    pub fn validate_header(&self, header: &[String]) -> Result<()> {
        if header.len() != self.columns.len() {
            return Err(IngestError::Parse(format!(
                "header has {} columns, expected {}",
                header.len(),
                self.columns.len()
            )));
        }

        for (index, (label, spec)) in header.iter().zip(&self.columns).enumerate() {
            if normalize_label(label) != normalize_label(&spec.header) {
                return Err(IngestError::Parse(format!(
                    "column {} is '{}', expected '{}'",
                    index + 1,
                    label,
                    spec.header
                )));
            }
        }

        Ok(())
    }

    /// Convert one raw row into a record of the given league
    pub fn to_record(&self, league: &str, row: &RawRow) -> Result<TransferRecord> {
        if row.cells.len() != self.columns.len() {
            return Err(IngestError::Parse(format!(
                "row has {} cells, expected {}",
                row.cells.len(),
                self.columns.len()
            )));
        }

        let mut player = None;
        let mut date = None;
        let mut club = None;
        let mut contract_type = None;

        for (cell, spec) in row.cells.iter().zip(&self.columns) {
            match spec.field {
                Some(Field::Player) => {
                    let link = cell.href.clone().ok_or_else(|| {
                        IngestError::Parse(format!("player '{}' has no profile link", cell.text))
                    })?;
                    player = Some((cell.text.clone(), link));
                },
                Some(Field::Date) => date = Some(parse_source_date(&cell.text)?),
                Some(Field::Club) => club = Some(cell.text.clone()),
                Some(Field::ContractType) => contract_type = Some(cell.text.clone()),
                None => {},
            }
        }

        let missing = |name: &str| IngestError::Parse(format!("schema does not map {}", name));
        let (player, player_link) = player.ok_or_else(|| missing("player"))?;

        TransferRecord::new(
            league,
            player,
            player_link,
            date.ok_or_else(|| missing("date"))?,
            club.ok_or_else(|| missing("club"))?,
            contract_type.ok_or_else(|| missing("contract type"))?,
        )
        .map_err(|e| IngestError::Parse(e.to_string()))
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self::league_transfers()
    }
}

/// Parse the listing's `DD.MM.YYYY / HH:MM` timestamp
pub fn parse_source_date(raw: &str) -> Result<NaiveDateTime> {
    let compact: String = raw.split_whitespace().collect();
    NaiveDateTime::parse_from_str(&compact, SOURCE_DATE_FORMAT)
        .map_err(|e| IngestError::Parse(format!("invalid date '{}': {}", raw, e)))
}

fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::parser::Cell;

    fn row(date: &str, player: Cell) -> RawRow {
        RawRow {
            cells: vec![
                Cell::text(date),
                player,
                Cell::text("Red Lions"),
                Cell::text("Free"),
                Cell::text("Classic Contract"),
            ],
        }
    }

    #[test]
    fn test_parse_source_date() {
        let date = parse_source_date("01.07.2024 / 18:30").unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2024-07-01 18:30");

        assert!(parse_source_date(" 01.07.2024/18:30 ").is_ok());
        assert!(parse_source_date("2024-07-01 18:30").is_err());
        assert!(parse_source_date("32.07.2024 / 18:30").is_err());
    }

    #[test]
    fn test_to_record_maps_columns_and_drops_transfer_type() {
        let schema = TableSchema::default();
        let record = schema
            .to_record("Super League", &row("01.07.2024 / 18:30", Cell::link("Jane", "https://x.test/p/1")))
            .unwrap();

        assert_eq!(record.player(), "Jane");
        assert_eq!(record.player_link(), "https://x.test/p/1");
        assert_eq!(record.club(), "Red Lions");
        assert_eq!(record.contract_type(), "Classic Contract");
    }

    #[test]
    fn test_player_without_link_is_parse_error() {
        let schema = TableSchema::default();
        let err = schema
            .to_record("L", &row("01.07.2024 / 18:30", Cell::text("Jane")))
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_short_row_is_parse_error() {
        let schema = TableSchema::default();
        let short = RawRow {
            cells: vec![Cell::text("01.07.2024 / 18:30")],
        };
        assert!(matches!(schema.to_record("L", &short), Err(IngestError::Parse(_))));
    }

    #[test]
    fn test_validate_header_is_case_insensitive() {
        let schema = TableSchema::default();
        let header: Vec<String> = ["DATE", "player", "Club", "Transfer  Type", "Contract Type"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(schema.validate_header(&header).is_ok());
        assert!(schema.validate_header(&header[..4]).is_err());
    }

    #[test]
    fn test_new_requires_each_field_once() {
        let missing_club = vec![
            ColumnSpec::mapped("Date", Field::Date),
            ColumnSpec::mapped("Player", Field::Player),
            ColumnSpec::mapped("Contract", Field::ContractType),
        ];
        assert!(TableSchema::new(missing_club).is_err());

        let reordered = vec![
            ColumnSpec::mapped("Player", Field::Player),
            ColumnSpec::mapped("Club", Field::Club),
            ColumnSpec::mapped("When", Field::Date),
            ColumnSpec::mapped("Contract", Field::ContractType),
        ];
        assert_eq!(TableSchema::new(reordered).unwrap().columns().len(), 4);
    }
}
