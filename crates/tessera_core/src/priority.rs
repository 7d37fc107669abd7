//! Request priority tiers.

/// Priority of a chunk request.
///
/// Ordered so that `Urgent > High > Normal > Low`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    /// Background prefetch.
    Low = 1,
    /// Default for on-demand tile reads.
    #[default]
    Normal = 2,
    /// Near the viewer.
    High = 3,
    /// Under the viewer.
    Urgent = 4,
}

impl Priority {
    /// Maps a chunk distance from the viewer to a priority tier.
    ///
    /// `<= 1` chunk is urgent, `<= 2` is high, everything else normal.
    #[must_use]
    pub fn from_distance(distance: f64) -> Self {
        if distance <= 1.0 {
            Self::Urgent
        } else if distance <= 2.0 {
            Self::High
        } else {
            Self::Normal
        }
    }

    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}
