/// Completion flags tracked per account
use std::fmt;

/// A crawl phase whose completion is persisted on the account row
///
/// Flags are monotonic: the crawler only ever sets them to true. Clearing one
/// requires the explicit reset operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionFlag {
    /// The account's posts have been fetched
    Reels,

    /// The account's follow list has been fetched
    Following,
}

impl CompletionFlag {
    /// Column holding this flag in the `accounts` table
    pub fn column(&self) -> &'static str {
        match self {
            Self::Reels => "reels_complete",
            Self::Following => "following_complete",
        }
    }

    pub fn both() -> [Self; 2] {
        [Self::Reels, Self::Following]
    }
}

impl fmt::Display for CompletionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}
