use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, CountMethod, ElectionId},
    db::{
        candidate::{Candidate, CandidateCore},
        election::{Election, ElectionCore},
    },
};

/// An election specification, as submitted when initializing the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub count_method: CountMethod,
    pub min_candidates: u32,
    pub max_candidates: u32,
    pub candidates: Vec<CandidateSpec>,
}

/// A candidate specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub presentation: String,
    #[serde(default)]
    pub image: String,
}

impl ElectionSpec {
    /// Reject specifications that could never hold a valid vote.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidElection(msg.to_string()));
        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.end_time <= self.start_time {
            return invalid("end time must be after start time");
        }
        if self.max_candidates == 0 {
            return invalid("max_candidates must be positive");
        }
        if self.min_candidates > self.max_candidates {
            return invalid("min_candidates must not exceed max_candidates");
        }
        if self.candidates.is_empty() {
            return invalid("at least one candidate is required");
        }
        let roster = u32::try_from(self.candidates.len()).unwrap_or(u32::MAX);
        if self.max_candidates > roster {
            return invalid("max_candidates exceeds the number of candidates");
        }
        Ok(())
    }

    /// Split this spec into an unpublished, uncounted election and its
    /// candidates, using the given IDs. `candidate_ids` must have one entry
    /// per candidate spec.
    pub fn into_election(
        self,
        election_id: ElectionId,
        candidate_ids: &[CandidateId],
    ) -> (Election, Vec<Candidate>) {
        let candidates = self
            .candidates
            .into_iter()
            .zip(candidate_ids)
            .map(|(spec, &id)| Candidate {
                id,
                candidate: CandidateCore {
                    election_id,
                    name: spec.name,
                    presentation: spec.presentation,
                    image: spec.image,
                    points: 0.0,
                },
            })
            .collect();
        let election = Election {
            id: election_id,
            election: ElectionCore {
                name: self.name,
                start_time: self.start_time,
                end_time: self.end_time,
                public: false,
                counted: false,
                count_method: self.count_method,
                min_candidates: self.min_candidates,
                max_candidates: self.max_candidates,
            },
        };
        (election, candidates)
    }
}

/// An election as shown to API clients, with its candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionView {
    pub id: ElectionId,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub public: bool,
    pub counted: bool,
    pub count_method: CountMethod,
    pub min_candidates: u32,
    pub max_candidates: u32,
    pub candidates: Vec<CandidateView>,
}

/// A candidate as shown to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: CandidateId,
    pub name: String,
    pub presentation: String,
    pub image: String,
    /// Only present once the election has been counted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
}

impl CandidateView {
    /// View a candidate, including its score only if `show_points` is set.
    pub fn new(candidate: Candidate, show_points: bool) -> Self {
        Self {
            id: candidate.id,
            points: show_points.then_some(candidate.points),
            name: candidate.candidate.name,
            presentation: candidate.candidate.presentation,
            image: candidate.candidate.image,
        }
    }
}

impl ElectionView {
    /// Combine an election with its candidates, hiding scores if it is uncounted.
    pub fn new(election: Election, candidates: Vec<Candidate>) -> Self {
        let counted = election.counted;
        Self {
            id: election.id,
            name: election.election.name,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            public: election.election.public,
            counted,
            count_method: election.election.count_method,
            min_candidates: election.election.min_candidates,
            max_candidates: election.election.max_candidates,
            candidates: candidates
                .into_iter()
                .map(|c| CandidateView::new(c, counted))
                .collect(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::{Duration, TimeZone};

    impl ElectionSpec {
        /// Four candidates, ranking 2 to 3 of them, open for a day from `start_time`.
        pub fn example(start_time: DateTime<Utc>) -> Self {
            Self {
                name: "Student Council".to_string(),
                start_time,
                end_time: start_time + Duration::days(1),
                count_method: CountMethod::Borda,
                min_candidates: 2,
                max_candidates: 3,
                candidates: ["Alice", "Bob", "Carol", "Dave"]
                    .into_iter()
                    .map(|name| CandidateSpec {
                        name: name.to_string(),
                        presentation: format!("Vote {name}!"),
                        image: String::new(),
                    })
                    .collect(),
            }
        }

        /// As [`Self::example`], starting at a fixed instant.
        pub fn fixed_example() -> Self {
            Self::example(Utc.with_ymd_and_hms(2023, 3, 1, 9, 0, 0).unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn assert_invalid(spec: ElectionSpec) {
        assert!(matches!(spec.validate(), Err(Error::InvalidElection(_))));
    }

    #[test]
    fn example_is_valid() {
        ElectionSpec::fixed_example().validate().unwrap();
    }

    #[test]
    fn invalid_specs() {
        let mut spec = ElectionSpec::fixed_example();
        spec.end_time = spec.start_time;
        assert_invalid(spec);

        let mut spec = ElectionSpec::fixed_example();
        spec.end_time = spec.start_time - Duration::seconds(1);
        assert_invalid(spec);

        let mut spec = ElectionSpec::fixed_example();
        spec.min_candidates = 0;
        spec.max_candidates = 0;
        assert_invalid(spec);

        let mut spec = ElectionSpec::fixed_example();
        spec.min_candidates = 3;
        spec.max_candidates = 2;
        assert_invalid(spec);

        let mut spec = ElectionSpec::fixed_example();
        spec.max_candidates = 5;
        assert_invalid(spec);

        let mut spec = ElectionSpec::fixed_example();
        spec.candidates.clear();
        assert_invalid(spec);

        let mut spec = ElectionSpec::fixed_example();
        spec.name = "  ".to_string();
        assert_invalid(spec);
    }

    #[test]
    fn into_election_assigns_ids_in_order() {
        let (election, candidates) = ElectionSpec::fixed_example().into_election(7, &[10, 11, 12, 13]);
        assert_eq!(election.id, 7);
        assert!(!election.public);
        assert!(!election.counted);
        let names: Vec<_> = candidates.iter().map(|c| (c.id, c.name.as_str())).collect();
        assert_eq!(
            names,
            vec![(10, "Alice"), (11, "Bob"), (12, "Carol"), (13, "Dave")]
        );
        assert!(candidates.iter().all(|c| c.election_id == 7 && c.points == 0.0));
    }

    #[test]
    fn points_hidden_until_counted() {
        let (mut election, mut candidates) =
            ElectionSpec::fixed_example().into_election(1, &[1, 2, 3, 4]);
        candidates[0].points = 7.0;

        let view = ElectionView::new(election.clone(), candidates.clone());
        assert!(view.candidates.iter().all(|c| c.points.is_none()));
        let json = rocket::serde::json::serde_json::to_value(&view).unwrap();
        assert!(json["candidates"][0].get("points").is_none());

        election.counted = true;
        let view = ElectionView::new(election, candidates);
        assert_eq!(view.candidates[0].points, Some(7.0));
        assert_eq!(view.candidates[1].points, Some(0.0));
    }
}
