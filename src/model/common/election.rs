use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Our election IDs are integers.
pub type ElectionId = u32;
/// Our candidate IDs are integers.
pub type CandidateId = u32;
/// Our ballot IDs are integers.
pub type BallotId = u32;

/// Ranked-voting methods used to turn ballots into candidate scores.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMethod {
    /// <https://en.wikipedia.org/wiki/Borda_count>
    Borda,
    /// Harmonic variant of the Borda count.
    Dowdall,
}

impl CountMethod {
    /// Points awarded to the candidate ranked at zero-based `position` on a
    /// single ballot, in an election with `total` registered candidates.
    pub fn points(self, position: usize, total: usize) -> f64 {
        match self {
            Self::Borda => total.saturating_sub(position) as f64,
            Self::Dowdall => 1.0 / (position as f64 + 1.0),
        }
    }
}

impl From<CountMethod> for Bson {
    fn from(method: CountMethod) -> Self {
        to_bson(&method).expect("Serialisation is infallible")
    }
}

/// Where a point in time falls relative to an election's `[start, end)` window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VotingWindow {
    NotStarted,
    Open,
    Closed,
}

impl VotingWindow {
    pub fn at(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            Self::NotStarted
        } else if now < end {
            Self::Open
        } else {
            Self::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};

    #[test]
    fn borda_points() {
        assert_eq!(CountMethod::Borda.points(0, 4), 4.0);
        assert_eq!(CountMethod::Borda.points(1, 4), 3.0);
        assert_eq!(CountMethod::Borda.points(3, 4), 1.0);
        // Never negative, even for an out-of-roster position.
        assert_eq!(CountMethod::Borda.points(5, 4), 0.0);
    }

    #[test]
    fn dowdall_points() {
        assert_eq!(CountMethod::Dowdall.points(0, 4), 1.0);
        assert_eq!(CountMethod::Dowdall.points(1, 4), 0.5);
        assert!((CountMethod::Dowdall.points(2, 4) - 1.0 / 3.0).abs() < 1e-12);
        // Independent of the roster size.
        assert_eq!(CountMethod::Dowdall.points(1, 100), 0.5);
    }

    #[test]
    fn count_method_names() {
        assert_eq!(to_bson(&CountMethod::Borda).unwrap(), Bson::String("borda".into()));
        assert_eq!(Bson::from(CountMethod::Dowdall), Bson::String("dowdall".into()));
    }

    #[test]
    fn window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2022, 5, 1, 9, 0, 0).unwrap();
        let end = start + Duration::hours(12);

        let just_before = start - Duration::milliseconds(1);
        assert_eq!(VotingWindow::at(just_before, start, end), VotingWindow::NotStarted);
        assert_eq!(VotingWindow::at(start, start, end), VotingWindow::Open);
        let just_inside = end - Duration::milliseconds(1);
        assert_eq!(VotingWindow::at(just_inside, start, end), VotingWindow::Open);
        assert_eq!(VotingWindow::at(end, start, end), VotingWindow::Closed);
    }
}
