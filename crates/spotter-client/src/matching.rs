//! Match Detector.
//!
//! After `me` likes `target`, detection runs three steps: read the reverse
//! edge `target -> me`, look for an existing match listing both, and create
//! one if none was found. Steps one and two are plain reads, so two users
//! liking each other at the same moment can both pass them. What happens
//! next depends on the [`MatchStrategy`]:
//!
//! * [`MatchStrategy::DeterministicKey`] creates the match under the pair's
//!   [`MatchKey`] with create-if-absent semantics. One creator wins, the
//!   other gets the existing document back.
//! * [`MatchStrategy::QueryThenCreate`] adds a document under a fresh id.
//!   Both creators succeed and the pair ends up with two match documents.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use spotter_shared::protocol::MatchRecord;
use spotter_shared::{MatchKey, UserId, UserPair};
use spotter_store::{CreateOutcome, StoreError};

use crate::error::{ClientError, Result};
use crate::session::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    #[default]
    DeterministicKey,
    QueryThenCreate,
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deterministic" | "key" => Ok(Self::DeterministicKey),
            "query" | "query-then-create" => Ok(Self::QueryThenCreate),
            other => Err(format!("unknown match strategy: {other}")),
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeterministicKey => f.write_str("deterministic"),
            Self::QueryThenCreate => f.write_str("query"),
        }
    }
}

/// What a detection run concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// `target` has not liked `me` (yet).
    NotReciprocated,
    /// The pair was already matched; nothing was written.
    AlreadyMatched(MatchRecord),
    /// This run wrote the match document.
    Created(MatchRecord),
}

impl Detection {
    pub fn record(&self) -> Option<&MatchRecord> {
        match self {
            Detection::NotReciprocated => None,
            Detection::AlreadyMatched(record) | Detection::Created(record) => Some(record),
        }
    }

    pub fn is_match(&self) -> bool {
        self.record().is_some()
    }
}

/// The detection step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStep {
    ReciprocalLike,
    ExistingMatches,
    CreateMatch,
}

impl fmt::Display for DetectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReciprocalLike => f.write_str("reciprocal like lookup"),
            Self::ExistingMatches => f.write_str("existing match lookup"),
            Self::CreateMatch => f.write_str("match creation"),
        }
    }
}

fn failed(step: DetectionStep) -> impl FnOnce(StoreError) -> ClientError {
    move |source| {
        if step == DetectionStep::CreateMatch && source.is_permission_denied() {
            ClientError::WriteDenied(source.to_string())
        } else {
            ClientError::DetectionFailed { step, source }
        }
    }
}

impl Session {
    /// Run detection for `me -> target` with the configured strategy.
    pub async fn detect_match(&self, target: &UserId) -> Result<Detection> {
        self.detect_match_with(target, self.config().match_strategy)
            .await
    }

    pub async fn detect_match_with(
        &self,
        target: &UserId,
        strategy: MatchStrategy,
    ) -> Result<Detection> {
        let me = self.me();
        let users = UserPair::new(me.clone(), target.clone())?;
        let store = self.store();

        let reverse = store
            .get_like(me, target, me)
            .await
            .map_err(failed(DetectionStep::ReciprocalLike))?;
        if !reverse.map_or(false, |edge| edge.liked) {
            debug!(target = %target.short(), "like not reciprocated");
            return Ok(Detection::NotReciprocated);
        }

        let existing = store
            .matches_for(me, me)
            .await
            .map_err(failed(DetectionStep::ExistingMatches))?;
        if let Some(record) = existing.into_iter().find(|m| m.users == users) {
            debug!(id = %record.id, "pair already matched");
            return Ok(Detection::AlreadyMatched(record));
        }

        let detection = match strategy {
            MatchStrategy::QueryThenCreate => {
                let record = store
                    .add_match(me, &users)
                    .await
                    .map_err(failed(DetectionStep::CreateMatch))?;
                Detection::Created(record)
            }
            MatchStrategy::DeterministicKey => {
                let key = MatchKey::for_pair(&users);
                match store
                    .create_match_if_absent(me, &key, &users)
                    .await
                    .map_err(failed(DetectionStep::CreateMatch))?
                {
                    CreateOutcome::Created(record) => Detection::Created(record),
                    CreateOutcome::Existing(record) => {
                        debug!(id = %record.id, "lost creation race, using existing match");
                        Detection::AlreadyMatched(record)
                    }
                }
            }
        };

        if let Detection::Created(record) = &detection {
            info!(id = %record.id, %users, %strategy, "match created");
        }
        Ok(detection)
    }
}
