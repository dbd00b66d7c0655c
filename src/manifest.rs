//! The slice of election metadata the cryptographic core consumes.
//!
//! Contest and selection descriptions arrive pre-validated from an external
//! manifest layer; this module carries just the identifiers, sequence orders
//! and limits the encryption and tally code needs, plus the placeholder
//! selections the core appends itself.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::crypto::group::ElementModQ;
use crate::hash_elems;

/// How votes are counted in a contest. Only n-of-m styles are supported;
/// anything else is rejected before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteVariation {
    OneOfM,
    NOfM,
}

/// A candidate (or ballot-measure answer) position within a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDescription {
    pub object_id: String,
    pub candidate_id: String,
    /// Orders selections within a contest so the nonce derivation is
    /// deterministic; unique within the contest.
    pub sequence_order: u32,
}

impl SelectionDescription {
    pub fn new(object_id: &str, candidate_id: &str, sequence_order: u32) -> SelectionDescription {
        SelectionDescription {
            object_id: object_id.to_string(),
            candidate_id: candidate_id.to_string(),
            sequence_order,
        }
    }

    pub fn crypto_hash(&self) -> ElementModQ {
        hash_elems!(&self.object_id, self.sequence_order, &self.candidate_id)
    }
}

/// A contest: the candidates on offer and the selection limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDescription {
    pub object_id: String,
    pub electoral_district_id: String,
    /// Orders contests on a ballot for deterministic nonce derivation.
    pub sequence_order: u32,
    pub vote_variation: VoteVariation,
    /// "n" of n-of-m: how many selections count, and how many placeholder
    /// selections get appended.
    pub number_elected: u32,
    /// Maximum votes a voter may spread in this contest; absent for plain
    /// n-of-m contests.
    pub votes_allowed: Option<u32>,
    pub name: String,
    pub ballot_selections: Vec<SelectionDescription>,
}

impl ContestDescription {
    pub fn crypto_hash(&self) -> ElementModQ {
        let selection_hashes: Vec<ElementModQ> = self
            .ballot_selections
            .iter()
            .map(SelectionDescription::crypto_hash)
            .collect();
        let variation = match self.vote_variation {
            VoteVariation::OneOfM => "one_of_m",
            VoteVariation::NOfM => "n_of_m",
        };
        hash_elems!(
            &self.object_id,
            self.sequence_order,
            &self.electoral_district_id,
            variation,
            &self.name,
            self.number_elected,
            &self.votes_allowed,
            &selection_hashes,
        )
    }

    /// Structural sanity of the description itself: the selection limit fits,
    /// ids and sequence orders are unique.
    pub fn is_valid(&self) -> bool {
        let number_elected_fits = (self.number_elected as usize) <= self.ballot_selections.len();
        let votes_allowed_fits = match self.votes_allowed {
            None => true,
            Some(allowed) => self.number_elected <= allowed,
        };

        let mut selection_ids = HashSet::new();
        let mut sequence_ids = HashSet::new();
        let mut candidate_ids = HashSet::new();
        for selection in &self.ballot_selections {
            selection_ids.insert(selection.object_id.clone());
            sequence_ids.insert(selection.sequence_order);
            candidate_ids.insert(selection.candidate_id.clone());
        }
        let unique = selection_ids.len() == self.ballot_selections.len()
            && sequence_ids.len() == self.ballot_selections.len()
            && candidate_ids.len() == self.ballot_selections.len();

        number_elected_fits && votes_allowed_fits && unique
    }
}

/// Which contests a ballot of this style participates in, via its
/// geopolitical units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStyle {
    pub object_id: String,
    pub geopolitical_unit_ids: Vec<String>,
}

/// A contest padded with its placeholder selections: one placeholder per
/// elected seat, so that a well-formed encrypted contest always carries
/// exactly `number_elected` true selections no matter how the voter
/// undervoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestWithPlaceholders {
    pub contest: ContestDescription,
    pub placeholder_selections: Vec<SelectionDescription>,
}

impl ContestWithPlaceholders {
    pub fn is_valid(&self) -> bool {
        self.contest.is_valid()
            && self.placeholder_selections.len() == self.contest.number_elected as usize
    }
}

/// Generate `count` placeholder selection descriptions for a contest, with
/// sequence orders continuing past the real maximum so they can never
/// collide with a real selection.
pub fn generate_placeholder_selections(
    contest: &ContestDescription,
    count: u32,
) -> Vec<SelectionDescription> {
    let max_sequence_order = contest
        .ballot_selections
        .iter()
        .map(|s| s.sequence_order)
        .max()
        .unwrap_or(0);
    (0..count)
        .map(|i| {
            let sequence_order = max_sequence_order + 1 + i;
            let placeholder_id = format!("{}-{}", contest.object_id, sequence_order);
            SelectionDescription::new(
                &format!("{}-placeholder", placeholder_id),
                &format!("{}-candidate", placeholder_id),
                sequence_order,
            )
        })
        .collect()
}

/// The election metadata in the form the core works with: a hash of the full
/// external manifest, the ballot styles, and every contest padded with its
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalManifest {
    /// The hash of the external election manifest; seeds every ballot hash.
    pub manifest_hash: ElementModQ,
    pub ballot_styles: Vec<BallotStyle>,
    pub contests: Vec<ContestWithPlaceholders>,
}

impl InternalManifest {
    pub fn new(
        manifest_hash: ElementModQ,
        ballot_styles: Vec<BallotStyle>,
        contests: Vec<ContestDescription>,
    ) -> InternalManifest {
        let contests = contests
            .into_iter()
            .map(|contest| {
                let placeholder_selections =
                    generate_placeholder_selections(&contest, contest.number_elected);
                ContestWithPlaceholders {
                    contest,
                    placeholder_selections,
                }
            })
            .collect();
        InternalManifest {
            manifest_hash,
            ballot_styles,
            contests,
        }
    }

    pub fn get_ballot_style(&self, ballot_style_id: &str) -> Option<&BallotStyle> {
        self.ballot_styles
            .iter()
            .find(|style| style.object_id == ballot_style_id)
    }

    pub fn contest_for(&self, contest_id: &str) -> Option<&ContestWithPlaceholders> {
        self.contests
            .iter()
            .find(|c| c.contest.object_id == contest_id)
    }

    /// The contests a ballot of the given style votes on, in manifest order.
    pub fn get_contests_for_style(&self, ballot_style_id: &str) -> Vec<&ContestWithPlaceholders> {
        let style = match self.get_ballot_style(ballot_style_id) {
            Some(style) => style,
            None => return Vec::new(),
        };
        self.contests
            .iter()
            .filter(|c| {
                style
                    .geopolitical_unit_ids
                    .contains(&c.contest.electoral_district_id)
            })
            .collect()
    }
}
