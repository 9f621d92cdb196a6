//! Reconciliation engine: merges authoritative snapshots into local state
//! without stomping the self-token's in-flight position.
//!
//! Two decisions differ between deployments and are policies here rather
//! than hardcoded:
//!
//! - **Transition detection** ([`TransitionPolicy`]): whether a puzzle id
//!   must strictly increase, or merely change, to count as a new puzzle.
//! - **Ownership** ([`OwnershipPolicy`]): whether the server dictates the
//!   self-token index or the client picks a random slot per puzzle.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::SessionState;
use crate::types::{PuzzleState, Token, TokenSet};
use crate::wire::{Snapshot, WireToken};

// ─── Policies ─────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Any change in puzzle id is a new puzzle, including a decrease
    /// (the server can step back to a previous puzzle).
    #[default]
    Change,
    /// Only a strictly greater puzzle id is a new puzzle. Resets and
    /// replays are merged as steady state.
    Advance,
}

impl TransitionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Advance => "advance",
        }
    }

    /// Whether `remote` marks a new puzzle relative to `current`.
    /// The first snapshot of a session always does.
    pub fn is_transition(self, current: Option<i64>, remote: i64) -> bool {
        let Some(current) = current else {
            return true;
        };
        match self {
            Self::Change => remote != current,
            Self::Advance => remote > current,
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "change" | "ne" => Ok(Self::Change),
            "advance" | "gt" => Ok(Self::Advance),
            _ => Err(ConfigError::UnknownValue {
                field: "transition",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipPolicy {
    /// Accept the server's `TokenID` on every snapshot.
    #[default]
    Server,
    /// Ignore the server's `TokenID`; pick a uniformly random slot on
    /// each puzzle transition and keep it until the next one.
    Random,
}

impl OwnershipPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for OwnershipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnershipPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "random" => Ok(Self::Random),
            _ => Err(ConfigError::UnknownValue {
                field: "ownership",
                value: s.to_string(),
            }),
        }
    }
}

// ─── Outcome ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuzzleTransition {
    pub from: Option<i64>,
    pub to: i64,
}

/// What a single snapshot did to local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Set when the snapshot started a new puzzle.
    pub transition: Option<PuzzleTransition>,
    /// The self-token index differs from before the snapshot.
    pub token_changed: bool,
    /// Trailing entries dropped because the remote set shrank.
    pub trimmed: usize,
    /// A token id was out of range and the client fell back to spectating.
    pub demoted: bool,
}

impl ReconcileOutcome {
    pub fn is_transition(&self) -> bool {
        self.transition.is_some()
    }
}

// ─── Reconciler ───────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    pub transition: TransitionPolicy,
    pub ownership: OwnershipPolicy,
}

impl Reconciler {
    pub fn new(transition: TransitionPolicy, ownership: OwnershipPolicy) -> Self {
        Self {
            transition,
            ownership,
        }
    }

    /// Merge one validated snapshot into session, puzzle and token state.
    pub fn apply<R: Rng>(
        &self,
        session: &mut SessionState,
        puzzle: &mut PuzzleState,
        tokens: &mut TokenSet,
        remote: &Snapshot,
        rng: &mut R,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let prev_token = session.token_id();
        let remote_len = remote.tokens.len();

        // Identity has no local authority.
        if let Some(player_id) = remote.player_id {
            session.set_player_id(player_id);
        }
        if let Some(started) = remote.started {
            session.set_started(started);
        }

        let is_transition = self
            .transition
            .is_transition(session.puzzle_id(), remote.puzzle_id);

        let candidate = match self.ownership {
            OwnershipPolicy::Server => match remote.token_id {
                Some(raw) if raw < 0 => None,
                Some(raw) => match usize::try_from(raw) {
                    Ok(slot) => Some(slot),
                    Err(_) => {
                        outcome.demoted = true;
                        None
                    }
                },
                None => prev_token,
            },
            OwnershipPolicy::Random if is_transition => pick_random_slot(rng, remote_len),
            OwnershipPolicy::Random => prev_token,
        };
        let token_id = match candidate {
            Some(slot) if slot >= remote_len => {
                tracing::warn!(
                    token_id = slot,
                    tokens = remote_len,
                    "token id outside the token set, spectating"
                );
                outcome.demoted = true;
                None
            }
            other => other,
        };
        session.set_token_id(token_id);
        outcome.token_changed = token_id != prev_token;

        if is_transition {
            let from = session.puzzle_id();
            tokens.replace_all(&remote.tokens);
            puzzle.goal_text = remote.puzzle_goal.clone();
            session.set_puzzle_id(remote.puzzle_id);
            outcome.transition = Some(PuzzleTransition {
                from,
                to: remote.puzzle_id,
            });
            tracing::info!(
                from = ?from,
                to = remote.puzzle_id,
                tokens = remote_len,
                token_id = ?token_id,
                "new puzzle"
            );
        } else {
            // The self-token keeps its local position only when ownership
            // carried over from the previous snapshot. A freshly assigned
            // slot takes the server value.
            let keep = token_id.filter(|&slot| prev_token == Some(slot) && slot < tokens.len());
            outcome.trimmed = merge_tokens(tokens, &remote.tokens, keep);
            if outcome.trimmed > 0 {
                tracing::debug!(removed = outcome.trimmed, len = remote_len, "token set shrank");
            }
        }

        puzzle.cleared = remote.level_clear;
        puzzle.ghci_output = remote.ghci_output.clone();
        puzzle.players = remote.players;
        puzzle.lobby = remote.lobby;

        outcome
    }
}

/// Index-wise steady-state merge.
///
/// Every remote entry overwrites the local one except at `keep`, where the
/// local position survives (the label is still refreshed). The local set is
/// then trimmed to the remote length. Returns the number of trimmed entries.
pub fn merge_tokens(local: &mut TokenSet, remote: &[WireToken], keep: Option<usize>) -> usize {
    for (i, wire) in remote.iter().enumerate() {
        if keep == Some(i) {
            if let Some(own) = local.get_mut(i) {
                if own.label != wire.label {
                    own.label = wire.label.clone();
                }
                continue;
            }
        }
        local.put(i, Token::from(wire));
    }
    local.trim_to(remote.len())
}

fn pick_random_slot<R: Rng>(rng: &mut R, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else {
        Some(rng.random_range(0..len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Point;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn wire(label: &str, x: f64, y: f64) -> WireToken {
        WireToken {
            label: label.into(),
            x,
            y,
        }
    }

    fn snapshot(puzzle_id: i64, token_id: Option<i64>, tokens: Vec<WireToken>) -> Snapshot {
        Snapshot {
            token_id,
            player_id: Some(7),
            started: Some(true),
            puzzle_id,
            puzzle_goal: format!("goal-{puzzle_id}"),
            ghci_output: "<n/a>".into(),
            level_clear: false,
            players: 1,
            lobby: 0,
            tokens,
        }
    }

    fn three(x: f64) -> Vec<WireToken> {
        vec![wire("take", x, x), wire("5", x, x), wire("$", x, x)]
    }

    struct Fixture {
        reconciler: Reconciler,
        session: SessionState,
        puzzle: PuzzleState,
        tokens: TokenSet,
        rng: StdRng,
    }

    impl Fixture {
        fn new(transition: TransitionPolicy, ownership: OwnershipPolicy) -> Self {
            Self {
                reconciler: Reconciler::new(transition, ownership),
                session: SessionState::new(),
                puzzle: PuzzleState::default(),
                tokens: TokenSet::new(),
                rng: StdRng::seed_from_u64(7),
            }
        }

        fn apply(&mut self, s: &Snapshot) -> ReconcileOutcome {
            self.reconciler.apply(
                &mut self.session,
                &mut self.puzzle,
                &mut self.tokens,
                s,
                &mut self.rng,
            )
        }
    }

    #[test]
    fn first_snapshot_is_a_transition() {
        let mut f = Fixture::new(TransitionPolicy::Advance, OwnershipPolicy::Server);
        let out = f.apply(&snapshot(0, Some(1), three(0.5)));
        assert_eq!(
            out.transition,
            Some(PuzzleTransition { from: None, to: 0 })
        );
        assert_eq!(f.session.puzzle_id(), Some(0));
        assert_eq!(f.session.token_id(), Some(1));
        assert_eq!(f.session.player_id(), 7);
        assert!(f.session.started());
        assert_eq!(f.puzzle.goal_text, "goal-0");
        assert_eq!(f.tokens.len(), 3);
    }

    #[test]
    fn change_policy_treats_decrease_as_transition() {
        assert!(TransitionPolicy::Change.is_transition(Some(4), 3));
        assert!(TransitionPolicy::Change.is_transition(Some(4), 5));
        assert!(!TransitionPolicy::Change.is_transition(Some(4), 4));
    }

    #[test]
    fn advance_policy_ignores_decrease() {
        assert!(!TransitionPolicy::Advance.is_transition(Some(4), 3));
        assert!(TransitionPolicy::Advance.is_transition(Some(4), 5));
        assert!(!TransitionPolicy::Advance.is_transition(Some(4), 4));
        assert!(TransitionPolicy::Advance.is_transition(None, 0));
    }

    #[test]
    fn advance_policy_merges_replayed_puzzle() {
        let mut f = Fixture::new(TransitionPolicy::Advance, OwnershipPolicy::Server);
        f.apply(&snapshot(4, Some(0), three(0.5)));
        let out = f.apply(&snapshot(3, Some(0), three(0.2)));
        assert!(!out.is_transition());
        assert_eq!(f.session.puzzle_id(), Some(4));
        assert_eq!(f.puzzle.goal_text, "goal-4", "goal only refreshes on transition");
        assert_eq!(f.tokens.get(1).unwrap().position(), Point::new(0.2, 0.2));
    }

    #[test]
    fn steady_state_keeps_self_token() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, Some(2), three(0.3)));
        f.tokens.get_mut(2).unwrap().move_to(Point::new(0.5, 0.7));

        let out = f.apply(&snapshot(1, Some(2), three(0.1)));
        assert!(!out.is_transition());
        assert_eq!(f.tokens.get(2).unwrap().position(), Point::new(0.5, 0.7));
        assert_eq!(f.tokens.get(0).unwrap().position(), Point::new(0.1, 0.1));
        assert_eq!(f.tokens.get(1).unwrap().position(), Point::new(0.1, 0.1));
    }

    #[test]
    fn newly_assigned_slot_takes_server_value() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, Some(-1), three(0.3)));
        assert!(f.session.is_spectator());

        let out = f.apply(&snapshot(1, Some(0), three(0.9)));
        assert!(out.token_changed);
        assert_eq!(f.session.token_id(), Some(0));
        assert_eq!(f.tokens.get(0).unwrap().position(), Point::new(0.9, 0.9));
    }

    #[test]
    fn reassignment_releases_previous_slot() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, Some(0), three(0.3)));
        f.tokens.get_mut(0).unwrap().move_to(Point::new(0.8, 0.8));

        f.apply(&snapshot(1, Some(1), three(0.4)));
        assert_eq!(f.tokens.get(0).unwrap().position(), Point::new(0.4, 0.4));
        assert_eq!(f.tokens.get(1).unwrap().position(), Point::new(0.4, 0.4));
    }

    #[test]
    fn shrink_trims_trailing_entries() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, Some(0), three(0.3)));
        let out = f.apply(&snapshot(1, Some(0), vec![wire("take", 0.1, 0.1)]));
        assert_eq!(out.trimmed, 2);
        assert_eq!(f.tokens.len(), 1);
    }

    #[test]
    fn growth_appends_entries() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, None, vec![wire("a", 0.1, 0.1)]));
        f.apply(&snapshot(1, None, three(0.6)));
        assert_eq!(f.tokens.len(), 3);
        assert_eq!(f.tokens.get(2).unwrap().label, "$");
    }

    #[test]
    fn out_of_range_token_id_demotes_to_spectator() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        let out = f.apply(&snapshot(1, Some(5), three(0.3)));
        assert!(out.demoted);
        assert!(f.session.is_spectator());
    }

    #[test]
    fn kept_token_demoted_when_set_shrinks_past_it() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, Some(2), three(0.3)));
        let legacy = Snapshot {
            token_id: None,
            ..snapshot(1, None, vec![wire("take", 0.1, 0.1)])
        };
        let out = f.apply(&legacy);
        assert!(out.demoted);
        assert!(f.session.is_spectator());
        assert_eq!(f.tokens.len(), 1);
    }

    #[test]
    fn missing_identity_fields_keep_previous_values() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(1, Some(1), three(0.3)));
        let legacy = Snapshot {
            token_id: None,
            player_id: None,
            started: None,
            ..snapshot(1, None, three(0.3))
        };
        f.apply(&legacy);
        assert_eq!(f.session.token_id(), Some(1));
        assert_eq!(f.session.player_id(), 7);
        assert!(f.session.started());
    }

    #[test]
    fn random_ownership_picks_slot_on_transition_only() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Random);
        f.apply(&snapshot(0, Some(99), three(0.3)));
        let picked = f.session.token_id().expect("slot picked");
        assert!(picked < 3);

        for _ in 0..10 {
            f.apply(&snapshot(0, Some(99), three(0.3)));
            assert_eq!(f.session.token_id(), Some(picked), "stable within a puzzle");
        }

        f.apply(&snapshot(1, None, vec![wire("x", 0.0, 0.0)]));
        assert_eq!(f.session.token_id(), Some(0));
    }

    #[test]
    fn random_ownership_with_empty_puzzle_spectates() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Random);
        f.apply(&snapshot(0, None, vec![]));
        assert!(f.session.is_spectator());
    }

    #[test]
    fn transition_replaces_tokens_wholesale() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        f.apply(&snapshot(4, Some(2), three(0.3)));
        f.tokens.get_mut(2).unwrap().move_to(Point::new(0.5, 0.7));

        let mut next = snapshot(
            5,
            Some(2),
            vec![
                wire("succ", 0.1, 0.2),
                wire("$", 0.3, 0.4),
                wire("sum", 0.9, 0.9),
            ],
        );
        next.level_clear = true;
        let out = f.apply(&next);

        assert_eq!(
            out.transition,
            Some(PuzzleTransition {
                from: Some(4),
                to: 5
            })
        );
        assert_eq!(f.puzzle.goal_text, "goal-5");
        assert!(f.puzzle.cleared);
        assert_eq!(f.tokens.get(2).unwrap().position(), Point::new(0.9, 0.9));
        assert_eq!(f.tokens.get(0).unwrap().label, "succ");
    }

    #[test]
    fn display_fields_copied_verbatim() {
        let mut f = Fixture::new(TransitionPolicy::Change, OwnershipPolicy::Server);
        let mut s = snapshot(0, Some(0), three(0.3));
        s.ghci_output = "λ> take 5\n".into();
        s.players = 3;
        s.lobby = 4;
        f.apply(&s);
        assert_eq!(f.puzzle.ghci_output, "λ> take 5\n");
        assert_eq!(f.puzzle.players, 3);
        assert_eq!(f.puzzle.lobby, 4);
    }

    #[test]
    fn merge_refreshes_label_of_kept_token() {
        let mut local = TokenSet::from(vec![Token::new("old", 0.5, 0.5)]);
        let trimmed = merge_tokens(&mut local, &[wire("new", 0.1, 0.1)], Some(0));
        assert_eq!(trimmed, 0);
        let own = local.get(0).unwrap();
        assert_eq!(own.label, "new");
        assert_eq!(own.position(), Point::new(0.5, 0.5));
    }

    #[test]
    fn policies_parse_from_str() {
        assert_eq!("change".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Change);
        assert_eq!("GT".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Advance);
        assert_eq!("random".parse::<OwnershipPolicy>().unwrap(), OwnershipPolicy::Random);
        assert!("sometimes".parse::<OwnershipPolicy>().is_err());
    }
}
