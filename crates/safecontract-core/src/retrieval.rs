//! Supplementary-context lookup.

use async_trait::async_trait;

use crate::cancel::CancelSignal;
use crate::error::RetrievalError;

/// Returns context text relevant to a query.
///
/// A miss is `Ok(None)`, never an error.
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<String>, RetrievalError>;
}

/// Demo provider: case-insensitive keyword match over a fixed excerpt table.
#[derive(Debug, Clone)]
pub struct KeywordRetrieval {
    entries: Vec<(String, String)>,
}

impl KeywordRetrieval {
    /// Entries are checked in order; the first keyword found wins.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    fn lookup(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();
        self.entries
            .iter()
            .find(|(keyword, _)| query.contains(keyword.as_str()))
            .map(|(_, excerpt)| excerpt.as_str())
    }
}

impl Default for KeywordRetrieval {
    fn default() -> Self {
        Self::with_entries([
            (
                "termination",
                "Termination Clause: This Agreement may be terminated by either party upon thirty (30) days prior written notice. [Source: Master Service Agreement, p.4]",
            ),
            (
                "liability",
                "Limitation of Liability: The total liability of either party shall not exceed the total fees paid under this Agreement in the twelve (12) months preceding the claim. [Source: Master Service Agreement, p.7]",
            ),
            (
                "payment",
                "Payment Terms: Invoices are due and payable within thirty (30) days of the invoice date. Late payments shall accrue interest at 1.5% per month. [Source: Master Service Agreement, p.2]",
            ),
        ])
    }
}

#[async_trait]
impl RetrievalProvider for KeywordRetrieval {
    async fn search(
        &self,
        query: &str,
        _cancel: &CancelSignal,
    ) -> Result<Option<String>, RetrievalError> {
        Ok(self.lookup(query).map(str::to_owned))
    }
}
