//! Result-set keys and file naming.

use chrono::{DateTime, Local, TimeZone};

/// Identifies one result file: board, keyword signature and period bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub board: String,
    pub signature: String,
    /// `YYYYMM`
    pub period: String,
}

impl ResultKey {
    pub fn new(
        board: impl Into<String>,
        signature: impl Into<String>,
        period: impl Into<String>,
    ) -> Self {
        Self {
            board: board.into(),
            signature: signature.into(),
            period: period.into(),
        }
    }

    /// Key for the current local month.
    pub fn current(board: impl Into<String>, signature: impl Into<String>) -> Self {
        Self::new(board, signature, period_of(&Local::now()))
    }

    /// `ptt_{board}_{signature}_{period}.json`
    pub fn file_name(&self) -> String {
        format!("ptt_{}_{}_{}.json", self.board, self.signature, self.period)
    }
}

/// Year-month bucket of a timestamp.
pub fn period_of<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y%m").to_string()
}
