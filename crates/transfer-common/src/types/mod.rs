//! Domain types shared by the ingestion pipeline

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TransferError};
use crate::identity::compute_id;

/// Format used when a transfer date is stringified for hashing and storage
pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Path template used by the league transfer listing
pub const DEFAULT_PATH_TEMPLATE: &str = "tournaments/league_transfers/{id}?page={page}";

// ============================================================================
// Transfer Records
// ============================================================================

/// One normalized row of a transfer listing.
///
/// Fields are private: the `id` is derived from the other fields when the
/// record is built and a record never changes afterwards.
///
/// # Examples
///
/// ```rust,ignore
/// let record = TransferRecord::new(
///     "Super League",
///     "Jane Doe",
///     "https://example.com/players/7",
///     date,
///     "Red Lions",
///     "Classic Contract",
/// )?;
/// assert_eq!(record.id().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    league: String,
    player: String,
    player_link: String,
    date: NaiveDateTime,
    club: String,
    contract_type: String,
    id: String,
}

impl TransferRecord {
    /// Build a record and attach its content-hash identity
    pub fn new(
        league: impl Into<String>,
        player: impl Into<String>,
        player_link: impl Into<String>,
        date: NaiveDateTime,
        club: impl Into<String>,
        contract_type: impl Into<String>,
    ) -> Result<Self> {
        let player = player.into();
        let player_link = player_link.into();

        if player.trim().is_empty() {
            return Err(TransferError::InvalidRecord("player name is empty".to_string()));
        }

        let parsed = Url::parse(&player_link).map_err(|e| {
            TransferError::InvalidRecord(format!("player link '{}' is not absolute: {}", player_link, e))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(TransferError::InvalidRecord(format!(
                "player link '{}' is not a navigable URL",
                player_link
            )));
        }

        let mut record = Self {
            league: league.into(),
            player,
            player_link,
            date,
            club: club.into(),
            contract_type: contract_type.into(),
            id: String::new(),
        };
        let fields = record.identity_fields();
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        record.id = compute_id(&fields);
        Ok(record)
    }

    /// Hashed fields in their fixed order: league, player, link, date, club,
    /// contract type
    pub fn identity_fields(&self) -> [String; 6] {
        [
            self.league.clone(),
            self.player.clone(),
            self.player_link.clone(),
            self.date_string(),
            self.club.clone(),
            self.contract_type.clone(),
        ]
    }

    pub fn league(&self) -> &str {
        &self.league
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn player_link(&self) -> &str {
        &self.player_link
    }

    pub fn date(&self) -> NaiveDateTime {
        self.date
    }

    pub fn club(&self) -> &str {
        &self.club
    }

    pub fn contract_type(&self) -> &str {
        &self.contract_type
    }

    /// Content-hash identity (SHA-256, lowercase hex)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Date in the canonical storage format
    pub fn date_string(&self) -> String {
        self.date.format(DATE_STORAGE_FORMAT).to_string()
    }

    /// Classification of the free-text contract type
    pub fn contract_kind(&self) -> ContractKind {
        ContractKind::from_contract_type(&self.contract_type)
    }
}

/// Contract categories that the report distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// A player joined a club
    Classic,
    /// A player left a club
    Cancel,
    /// Anything else the source reports
    Other,
}

impl ContractKind {
    pub fn from_contract_type(contract_type: &str) -> Self {
        match normalize_contract_type(contract_type).as_str() {
            "classic contract" => ContractKind::Classic,
            "contract cancel" => ContractKind::Cancel,
            _ => ContractKind::Other,
        }
    }
}

/// Trim, collapse inner whitespace, and lowercase a contract type
pub fn normalize_contract_type(contract_type: &str) -> String {
    contract_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// Sources
// ============================================================================

/// One independently paginated listing to scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Identifier substituted for `{id}` in the path template (e.g., "34")
    pub id: String,

    /// Display name, stored as the record's league
    pub name: String,

    /// Relative path with `{id}` and `{page}` placeholders
    pub path_template: String,
}

impl Source {
    /// Create a source using the default listing path
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path_template: DEFAULT_PATH_TEMPLATE.to_string(),
        }
    }

    pub fn with_path_template(mut self, template: impl Into<String>) -> Self {
        self.path_template = template.into();
        self
    }

    /// Relative path of one listing page
    pub fn page_path(&self, page: u32) -> String {
        self.path_template
            .replace("{id}", &self.id)
            .replace("{page}", &page.to_string())
    }

    /// Absolute URL of one listing page
    pub fn page_url(&self, base: &Url, page: u32) -> Result<Url> {
        Ok(base.join(&self.page_path(page))?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(TransferError::InvalidSource("source id cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(TransferError::InvalidSource(format!(
                "source '{}' has an empty display name",
                self.id
            )));
        }
        if !self.path_template.contains("{page}") {
            return Err(TransferError::InvalidSource(format!(
                "path template for source '{}' has no {{page}} placeholder",
                self.id
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for Source {
    type Err = TransferError;

    /// Parse `id=Display Name`; a bare id is used as its own name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (id, name) = match s.split_once('=') {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (s.trim(), s.trim()),
        };
        let source = Source::new(id, name);
        source.validate()?;
        Ok(source)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
