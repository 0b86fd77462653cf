//! A simple CLI tool for recounting a published election.
//! This uses the server's own scoring code, and is by definition
//! compatible with the output of our results endpoint.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use ballot_box_backend::{
    model::{api::results::ElectionResults, common::election::CandidateId},
    voting::{cast::validate_ranking, tally::score},
};

const PROGRAM_NAME: &str = "recount";

const ABOUT_TEXT: &str = "Independently recount a published election.

EXIT CODES:
     0: Recount matches the published points.
   255: Ran successfully, but the recount disagrees.
 Other: Error.";

const RESULTS_PATH: &str = "RESULTS_PATH";

const RESULTS_PATH_HELP: &str = "The path to a JSON dump of a counted election,\n\
as returned by `GET /elections/<election_id>/results`";

/// Published and recounted points may differ by this much.
const TOLERANCE: f64 = 1e-9;

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(RESULTS_PATH)
            .help(RESULTS_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// The recount failed for the contained reason.
    Recount(RecountError),
}

/// Ways in which a dump can disagree with itself.
#[derive(Debug, PartialEq)]
enum RecountError {
    /// The election has not been counted, so there is nothing to check.
    NotCounted,
    /// A ballot could never have been accepted.
    InvalidBallot { index: usize, reason: String },
    /// A candidate's published points do not match the recount.
    Points {
        candidate_id: CandidateId,
        published: Option<f64>,
        recounted: f64,
    },
}

impl Display for RecountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCounted => write!(f, "The election has not been counted."),
            Self::InvalidBallot { index, reason } => {
                write!(f, "Ballot {index} is invalid: {reason}.")
            }
            Self::Points {
                candidate_id,
                published: Some(published),
                recounted,
            } => write!(
                f,
                "Candidate {candidate_id} was published with {published} points, but recounts to {recounted}."
            ),
            Self::Points {
                candidate_id,
                published: None,
                recounted,
            } => write!(
                f,
                "Candidate {candidate_id} has no published points, but recounts to {recounted}."
            ),
        }
    }
}

/// One candidate's recounted standing.
#[derive(Debug, PartialEq)]
struct Standing {
    pub candidate_name: String,
    pub points: f64,
}

impl Display for Standing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} point{}",
            self.candidate_name,
            self.points,
            if self.points != 1.0 { "s" } else { "" }
        )
    }
}

/// Recount the dump at `path`, returning standings from first to last.
fn recount(path: &str) -> Result<Vec<Standing>, Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let results: ElectionResults =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    let election = &results.election;
    if !election.counted {
        return Err(Error::Recount(RecountError::NotCounted));
    }

    // Every ballot must be one the server could have accepted.
    let roster: Vec<CandidateId> = election.candidates.iter().map(|c| c.id).collect();
    let roster_set: HashSet<CandidateId> = roster.iter().copied().collect();
    for (index, ballot) in results.ballots.iter().enumerate() {
        let len = u32::try_from(ballot.len()).unwrap_or(u32::MAX);
        if len < election.min_candidates || len > election.max_candidates {
            return Err(Error::Recount(RecountError::InvalidBallot {
                index,
                reason: format!(
                    "ranks {len} candidates, expected {} to {}",
                    election.min_candidates, election.max_candidates
                ),
            }));
        }
        validate_ranking(ballot, &roster_set).map_err(|e| {
            Error::Recount(RecountError::InvalidBallot {
                index,
                reason: e.to_string(),
            })
        })?;
    }

    // Compare against the published points.
    let scores = score(election.count_method, &roster, &results.ballots);
    let mut standings = Vec::with_capacity(election.candidates.len());
    for candidate in &election.candidates {
        let recounted = scores.get(&candidate.id).copied().unwrap_or_default();
        match candidate.points {
            Some(published) if (published - recounted).abs() <= TOLERANCE => {}
            published => {
                return Err(Error::Recount(RecountError::Points {
                    candidate_id: candidate.id,
                    published,
                    recounted,
                }))
            }
        }
        standings.push(Standing {
            candidate_name: candidate.name.clone(),
            points: recounted,
        });
    }

    // Highest points first, then by name.
    standings.sort_by(|a, b| {
        b.points
            .total_cmp(&a.points)
            .then_with(|| a.candidate_name.cmp(&b.candidate_name))
    });
    Ok(standings)
}

/// Run the recount, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(RESULTS_PATH).unwrap(); // Required argument is guaranteed to be present.
    match recount(path) {
        Ok(standings) => {
            println!("Recount matches the published points.");
            for standing in standings {
                println!("{}", standing);
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {}", msg);
            1
        }
        Err(Error::Recount(err)) => {
            println!("Recount failed: {}", err);
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
