//! Match lists and the Match Notifier.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use spotter_shared::constants::MATCHES_COLLECTION;
use spotter_shared::protocol::{MatchRecord, UserProfile};
use spotter_shared::UserId;
use spotter_store::{Change, DirectoryStore, LiveQuery, Subscription, SubscriptionHandle};

use crate::error::Result;
use crate::scope::SubscriptionScope;
use crate::session::Session;

/// A match the user has not been told about yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub record: MatchRecord,
    pub counterpart: UserId,
    /// `None` if the profile is missing or could not be read.
    pub profile: Option<UserProfile>,
}

impl NewMatch {
    pub fn display_name(&self) -> &str {
        match &self.profile {
            Some(profile) => profile.display_name(),
            None => self.counterpart.as_str(),
        }
    }
}

/// Surfaces matches created after it started, once per counterpart.
///
/// The first snapshot only records what already exists, unless the session
/// is configured to announce existing matches. A pair that ended up with
/// more than one match document is still announced once.
pub struct MatchNotifier {
    store: Arc<dyn DirectoryStore>,
    me: UserId,
    matches: Subscription<MatchRecord>,
    seen: HashSet<UserId>,
    pending: VecDeque<MatchRecord>,
    primed: bool,
    announce_existing: bool,
    _session: SubscriptionScope,
}

impl MatchNotifier {
    /// Wait for the first snapshot. Returns how many counterparts are known.
    ///
    /// [`MatchNotifier::next`] primes implicitly; call this first to be sure
    /// matches created from now on count as new.
    pub async fn prime(&mut self) -> Result<usize> {
        if !self.primed {
            match self.matches.next().await {
                Some(Ok(snapshot)) => self.absorb(snapshot),
                Some(Err(e)) => return Err(e.into()),
                None => {}
            }
        }
        Ok(self.seen.len())
    }

    /// Next new match; `None` once cancelled.
    pub async fn next(&mut self) -> Option<Result<NewMatch>> {
        loop {
            if self.matches.is_cancelled() {
                return None;
            }
            if let Some(record) = self.pending.pop_front() {
                let announced = self.announce(record).await;
                // Cancelled while the profile was loading.
                if self.matches.is_cancelled() {
                    return None;
                }
                return Some(Ok(announced));
            }
            match self.matches.next().await? {
                Ok(snapshot) => self.absorb(snapshot),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    pub fn cancel(&mut self) {
        self.pending.clear();
        self.matches.cancel();
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.matches.handle()
    }

    fn absorb(&mut self, snapshot: Vec<MatchRecord>) {
        let announce = self.primed || self.announce_existing;
        for record in snapshot {
            let Some(counterpart) = record.users.other(&self.me).cloned() else {
                warn!(id = %record.id, "match does not list the signed-in user");
                continue;
            };
            if self.seen.insert(counterpart) && announce {
                self.pending.push_back(record);
            }
        }
        if !self.primed {
            debug!(known = self.seen.len(), "match notifier primed");
            self.primed = true;
        }
    }

    async fn announce(&self, record: MatchRecord) -> NewMatch {
        // `absorb` only queues records listing `me`.
        let counterpart = record.users.other(&self.me).cloned().unwrap_or_else(|| self.me.clone());
        let profile = match self.store.get_user(&self.me, &counterpart).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user = %counterpart.short(), error = %e, "could not load matched profile");
                None
            }
        };
        info!(id = %record.id, with = %counterpart.short(), "new match");
        NewMatch {
            record,
            counterpart,
            profile,
        }
    }
}

impl Session {
    /// Live list of the signed-in user's match documents, oldest first.
    pub fn watch_matches(&self) -> Subscription<MatchRecord> {
        let me = self.me().clone();
        let label = format!("matches of {}", me.short());
        let query = LiveQuery::new(
            self.store().clone(),
            label,
            |change: &Change| change.is_under(MATCHES_COLLECTION),
            move |store: Arc<dyn DirectoryStore>| {
                let me = me.clone();
                async move { store.matches_for(&me, &me).await }
            },
        );
        self.live(query)
    }

    pub fn watch_new_matches(&self) -> MatchNotifier {
        MatchNotifier {
            store: self.store().clone(),
            me: self.me().clone(),
            matches: self.watch_matches(),
            seen: HashSet::new(),
            pending: VecDeque::new(),
            primed: false,
            announce_existing: self.config().announce_existing_matches,
            _session: self.root(),
        }
    }

    /// Profiles of everyone the user matched with, in match order, each
    /// counterpart once. Counterparts without a profile are left out.
    pub async fn matched_profiles(&self) -> Result<Vec<UserProfile>> {
        let me = self.me();
        let matches = self.store().matches_for(me, me).await?;

        let mut seen = HashSet::new();
        let mut profiles = Vec::new();
        for record in matches {
            let Some(counterpart) = record.users.other(me) else {
                continue;
            };
            if !seen.insert(counterpart.clone()) {
                continue;
            }
            match self.store().get_user(me, counterpart).await? {
                Some(profile) => profiles.push(profile),
                None => debug!(user = %counterpart.short(), "matched user has no profile"),
            }
        }
        Ok(profiles)
    }
}
