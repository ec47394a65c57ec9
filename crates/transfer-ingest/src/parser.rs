//! HTML table parsing for transfer listing pages
//!
//! Extracts the first `<table>` of a page into raw rows (cell text plus any
//! hyperlink target, resolved to an absolute URL) and resolves the total page
//! count from the page's `.pagination` control.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use transfer_common::TransferRecord;
use url::Url;

use crate::error::{IngestError, Result};
use crate::schema::TableSchema;

/// One table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Visible text with whitespace collapsed
    pub text: String,
    /// Absolute hyperlink target when the cell contains a link
    pub href: Option<String>,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
        }
    }

    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: Some(href.into()),
        }
    }
}

/// One data row of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<Cell>,
}

/// Result of parsing one listing page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Header labels, when the table has a `<th>` row
    pub header: Option<Vec<String>>,
    pub rows: Vec<RawRow>,
    /// Last page of the listing; the current page when pagination is unresolved
    pub last_page: u32,
    pub pagination_resolved: bool,
}

/// Parser for listing tables
pub struct TableParser {
    schema: TableSchema,
    table: Selector,
    row: Selector,
    cell: Selector,
    link: Selector,
    pagination: Selector,
    pagination_item: Selector,
    page_param: Regex,
}

impl TableParser {
    pub fn new(schema: TableSchema) -> Result<Self> {
        Ok(Self {
            schema,
            table: selector("table")?,
            row: selector("tr")?,
            cell: selector("td, th")?,
            link: selector("a[href]")?,
            pagination: selector(".pagination")?,
            pagination_item: selector("a, span, li")?,
            page_param: Regex::new(r"[?&]page=(\d+)")
                .map_err(|e| IngestError::Parse(format!("invalid page pattern: {}", e)))?,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Parse one page
    ///
    /// `page_url` resolves relative links; `page` is the number of the page
    /// being parsed, used when no pagination control can be read.
    pub fn parse(&self, html: &str, page_url: &Url, page: u32) -> Result<ParsedPage> {
        let document = Html::parse_document(html);

        let table = document
            .select(&self.table)
            .next()
            .ok_or_else(|| IngestError::Parse(format!("no table found at {}", page_url)))?;

        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for tr in table.select(&self.row) {
            let cells: Vec<ElementRef> = tr.select(&self.cell).collect();
            if cells.is_empty() {
                continue;
            }

            let is_header = cells.iter().all(|c| c.value().name() == "th");
            if is_header {
                if header.is_none() {
                    header = Some(cells.iter().map(|c| collapse_text(*c)).collect());
                }
                continue;
            }

            let cells = cells
                .into_iter()
                .map(|c| self.extract_cell(c, page_url))
                .collect();
            rows.push(RawRow { cells });
        }

        if let Some(ref labels) = header {
            self.schema.validate_header(labels)?;
        }

        let (last_page, pagination_resolved) = match self.last_page(&document) {
            Some(last) => (last.max(page), true),
            None => {
                warn!(url = %page_url, page, "Pagination could not be determined, treating page as the last one");
                (page, false)
            },
        };

        Ok(ParsedPage {
            header,
            rows,
            last_page,
            pagination_resolved,
        })
    }

    /// Map parsed rows to records of the given league
    pub fn to_records(&self, page: &ParsedPage, league: &str) -> Result<Vec<TransferRecord>> {
        page.rows
            .iter()
            .map(|row| self.schema.to_record(league, row))
            .collect()
    }

    fn extract_cell(&self, cell: ElementRef, page_url: &Url) -> Cell {
        match cell.select(&self.link).next() {
            Some(link) => {
                let href = link
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|href| !href.is_empty())
                    .and_then(|href| page_url.join(href).ok())
                    .map(|url| url.to_string());
                Cell {
                    text: collapse_text(link),
                    href,
                }
            },
            None => Cell::text(collapse_text(cell)),
        }
    }

    /// Largest page number advertised by the pagination control
    fn last_page(&self, document: &Html) -> Option<u32> {
        let control = document.select(&self.pagination).next()?;
        let mut last: Option<u32> = None;

        for item in control.select(&self.pagination_item) {
            let from_text = collapse_text(item).parse::<u32>().ok();
            let from_href = item
                .value()
                .attr("href")
                .and_then(|href| self.page_param.captures(href))
                .and_then(|caps| caps[1].parse::<u32>().ok());

            for candidate in [from_text, from_href].into_iter().flatten() {
                last = Some(last.map_or(candidate, |current| current.max(candidate)));
            }
        }

        last.filter(|&n| n > 0)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| IngestError::Parse(format!("invalid selector '{}': {}", css, e)))
}

fn collapse_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
