//! Payment transactions and the table view over them.
//!
//! [`TransactionQuery`] reproduces what the transactions page does client-side: one search
//! box matched against every column, a sortable column, and fixed page sizes.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment as returned by `GET /v1/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    /// ISO 8601 date as sent by the API.
    pub date: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub status: TransactionStatus,
}

/// Body of `POST /v1/transactions`: a transaction without its server-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub status: TransactionStatus,
}

/// Body of `PUT /v1/transactions/:id`. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TransactionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Amount,
    Description,
    Date,
    Kind,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Page sizes offered by the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowsPerPage {
    Five,
    #[default]
    Ten,
    TwentyFive,
}

impl RowsPerPage {
    #[must_use]
    pub fn get(self) -> usize {
        match self {
            Self::Five => 5,
            Self::Ten => 10,
            Self::TwentyFive => 25,
        }
    }
}

impl TryFrom<usize> for RowsPerPage {
    type Error = usize;

    fn try_from(rows: usize) -> Result<Self, Self::Error> {
        match rows {
            5 => Ok(Self::Five),
            10 => Ok(Self::Ten),
            25 => Ok(Self::TwentyFive),
            other => Err(other),
        }
    }
}

/// Filter, sort and page settings of the transactions table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub global_filter: String,
    pub sort: Option<(SortField, SortOrder)>,
    /// Zero-based.
    pub page: usize,
    pub rows_per_page: RowsPerPage,
}

/// One page of the filtered, sorted table.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPage<'a> {
    pub rows: Vec<&'a Transaction>,
    /// Rows matching the filter, across all pages.
    pub total_records: usize,
    pub page: usize,
    pub page_count: usize,
}

impl TransactionQuery {
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.global_filter = filter.into();
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = Some((field, order));
        self
    }

    #[must_use]
    pub fn page(mut self, page: usize, rows_per_page: RowsPerPage) -> Self {
        self.page = page;
        self.rows_per_page = rows_per_page;
        self
    }

    /// Run the query. Pages past the end come back empty.
    #[must_use]
    pub fn apply<'a>(&self, transactions: &'a [Transaction]) -> TransactionPage<'a> {
        let needle = self.global_filter.trim().to_lowercase();
        let mut rows: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| needle.is_empty() || matches_filter(t, &needle))
            .collect();

        if let Some((field, order)) = self.sort {
            rows.sort_by(|a, b| {
                let ordering = compare(a, b, field);
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let total_records = rows.len();
        let per_page = self.rows_per_page.get();
        let page_count = total_records.div_ceil(per_page);
        let rows = rows
            .into_iter()
            .skip(self.page.saturating_mul(per_page))
            .take(per_page)
            .collect();

        TransactionPage {
            rows,
            total_records,
            page: self.page,
            page_count,
        }
    }
}

fn matches_filter(t: &Transaction, needle: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(needle);
    contains(&t.description)
        || t.category.as_deref().is_some_and(contains)
        || contains(&t.currency)
        || contains(&t.date)
        || contains(t.kind.as_str())
        || contains(t.status.as_str())
        || contains(&t.amount.to_string())
}

fn compare(a: &Transaction, b: &Transaction, field: SortField) -> Ordering {
    match field {
        SortField::Amount => a.amount.total_cmp(&b.amount),
        SortField::Description => a.description.cmp(&b.description),
        SortField::Date => a.date.cmp(&b.date),
        SortField::Kind => a.kind.as_str().cmp(b.kind.as_str()),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}
