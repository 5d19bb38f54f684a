/// Download status of a post
///
/// A post carries two independent boolean flags in the store, `downloaded` and
/// `unavailable`. This enum is the derived view of those flags.
use std::fmt;

/// Represents where a post stands in the media download lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostStatus {
    /// Neither flag is set; the download manager may still attempt it
    Pending,

    /// Media was fetched (or found on disk)
    Downloaded,

    /// Media failed permanently and will never be attempted again
    Unavailable,
}

impl PostStatus {
    /// Derives the status from the two persisted flags
    ///
    /// `downloaded` wins if both are somehow set, since a file on disk is the
    /// stronger evidence.
    pub fn from_flags(downloaded: bool, unavailable: bool) -> Self {
        match (downloaded, unavailable) {
            (true, _) => Self::Downloaded,
            (false, true) => Self::Unavailable,
            (false, false) => Self::Pending,
        }
    }

    /// Returns true if no further download attempt is allowed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Converts the status to the label used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::Unavailable => "unavailable",
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 3] {
        [Self::Pending, Self::Downloaded, Self::Unavailable]
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
