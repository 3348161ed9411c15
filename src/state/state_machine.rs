use std::{fmt, time::Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Stage of the round life cycle a room is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    /// Players join and the host configures the game.
    #[default]
    Lobby,
    /// Every player submits one song link for the round.
    Collect,
    /// The current song plays and players guess its owner.
    Guessing,
    /// Soft reveal of the current song: correctness count, owner still hidden.
    Reveal,
    /// Players vote for the best song of the round.
    Banger,
    /// Owners and per-song results of the round are disclosed.
    #[serde(rename = "roundreveal")]
    RoundReveal,
    /// Final scoreboard.
    Finished,
}

impl RoomPhase {
    /// Wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomPhase::Lobby => "lobby",
            RoomPhase::Collect => "collect",
            RoomPhase::Guessing => "guessing",
            RoomPhase::Reveal => "reveal",
            RoomPhase::Banger => "banger",
            RoomPhase::RoundReveal => "roundreveal",
            RoomPhase::Finished => "finished",
        }
    }

    /// Phases during which the song order and the current song pointer are meaningful.
    pub fn has_current_song(&self) -> bool {
        matches!(self, RoomPhase::Guessing | RoomPhase::Reveal)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host commands driving the room from one phase to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Leave the lobby and open round 1 for submissions.
    StartGame,
    /// Freeze the song order and play the first song.
    StartRound,
    /// Soft-reveal the current song.
    Reveal,
    /// Play the next song of the round.
    NextSong,
    /// All songs played with banger mode on.
    OpenBanger,
    /// Score the round and disclose owners.
    CloseRound,
    /// Open the following round for submissions.
    NextRound,
    /// Last round done.
    FinishGame,
    /// Zero the scores and go back to the lobby, from anywhere.
    Restart,
}

/// `event` is not accepted in phase `from`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from}")]
pub struct InvalidTransition {
    /// Phase the room was in.
    pub from: RoomPhase,
    /// Rejected event.
    pub event: RoomEvent,
}

/// Why a transition could not be planned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Another plan is still waiting to be applied or aborted.
    #[error("another transition is already pending")]
    AlreadyPending,
    /// The event is not valid in the current phase.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
}

/// Why a pending plan could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Nothing to apply.
    #[error("no transition is pending")]
    NoPending,
    /// The pending plan is a different one; it stays pending.
    #[error("plan id mismatch (expected {expected}, got {got})")]
    IdMismatch {
        /// Value recorded in the plan.
        expected: PlanId,
        /// Value supplied by the caller.
        got: PlanId,
    },
    /// The phase moved since the plan was made; the plan is dropped.
    #[error("phase changed since planning (expected {expected}, actual {actual})")]
    PhaseMismatch {
        /// Value recorded in the plan.
        expected: RoomPhase,
        /// Value found in the machine.
        actual: RoomPhase,
    },
    /// The version moved since the plan was made; the plan is dropped.
    #[error("version changed since planning (expected {expected}, actual {actual})")]
    VersionMismatch {
        /// Value recorded in the plan.
        expected: usize,
        /// Value found in the machine.
        actual: usize,
    },
}

/// Why a pending plan could not be aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortError {
    /// Nothing to abort.
    #[error("no transition is pending")]
    NoPending,
    /// The pending plan is a different one; it stays pending.
    #[error("plan id mismatch (expected {expected}, got {got})")]
    IdMismatch {
        /// Value recorded in the plan.
        expected: PlanId,
        /// Value supplied by the caller.
        got: PlanId,
    },
}

/// Identifier of a planned transition.
pub type PlanId = Uuid;

/// A validated transition waiting for its side effects to be persisted.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Token the caller passes back to `apply` or `abort`.
    pub id: PlanId,
    /// Phase the plan was validated against.
    pub from: RoomPhase,
    /// Phase the room enters when the plan is applied.
    pub to: RoomPhase,
    /// Event that produced the plan.
    pub event: RoomEvent,
    /// Version the machine reaches once the plan is applied.
    pub version_next: usize,
    /// When the plan was made, for timeout reporting.
    pub pending_since: Instant,
}

/// Read-only view of a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: RoomPhase,
    /// Number of transitions applied since the machine was created or resumed.
    pub version: usize,
    /// Target phase of the pending plan, if any.
    pub pending: Option<RoomPhase>,
}

/// Per-room phase tracker. At most one plan is pending at a time; the version
/// counter increases on every applied transition.
#[derive(Debug, Clone, Default)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
    pending: Option<Plan>,
}

impl RoomStateMachine {
    /// Machine in the lobby with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate a machine from the phase persisted in the room document.
    pub fn resume(phase: RoomPhase) -> Self {
        Self {
            phase,
            version: 0,
            pending: None,
        }
    }

    /// Current phase, ignoring any pending plan.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Phase, version and pending target in one read.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate `event` against the current phase and reserve the transition.
    pub fn plan(&mut self, event: RoomEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());
        Ok(plan)
    }

    /// Commit the pending plan once its side effects are persisted.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RoomPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        Ok(self.phase)
    }

    /// Drop the pending plan, leaving the phase unchanged.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        use RoomEvent as E;
        use RoomPhase as P;

        let next = match (self.phase, event) {
            (_, E::Restart) => P::Lobby,
            (P::Lobby, E::StartGame) => P::Collect,
            (P::Collect, E::StartRound) => P::Guessing,
            (P::Guessing, E::Reveal) => P::Reveal,
            (P::Reveal, E::NextSong) => P::Guessing,
            (P::Reveal, E::OpenBanger) => P::Banger,
            (P::Reveal | P::Banger, E::CloseRound) => P::RoundReveal,
            (P::RoundReveal, E::NextRound) => P::Collect,
            (P::RoundReveal, E::FinishGame) => P::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: RoomEvent) -> RoomPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_lobby() {
        assert_eq!(RoomStateMachine::new().phase(), RoomPhase::Lobby);
    }

    #[test]
    fn two_rounds_with_banger() {
        let mut sm = RoomStateMachine::new();

        assert_eq!(apply(&mut sm, RoomEvent::StartGame), RoomPhase::Collect);
        assert_eq!(apply(&mut sm, RoomEvent::StartRound), RoomPhase::Guessing);
        assert_eq!(apply(&mut sm, RoomEvent::Reveal), RoomPhase::Reveal);
        assert_eq!(apply(&mut sm, RoomEvent::NextSong), RoomPhase::Guessing);
        assert_eq!(apply(&mut sm, RoomEvent::Reveal), RoomPhase::Reveal);
        assert_eq!(apply(&mut sm, RoomEvent::OpenBanger), RoomPhase::Banger);
        assert_eq!(apply(&mut sm, RoomEvent::CloseRound), RoomPhase::RoundReveal);
        assert_eq!(apply(&mut sm, RoomEvent::NextRound), RoomPhase::Collect);
        assert_eq!(apply(&mut sm, RoomEvent::StartRound), RoomPhase::Guessing);
        assert_eq!(apply(&mut sm, RoomEvent::Reveal), RoomPhase::Reveal);
        assert_eq!(apply(&mut sm, RoomEvent::CloseRound), RoomPhase::RoundReveal);
        assert_eq!(apply(&mut sm, RoomEvent::FinishGame), RoomPhase::Finished);
        assert_eq!(sm.snapshot().version, 12);
    }

    #[test]
    fn restart_is_valid_from_every_phase() {
        for phase in [
            RoomPhase::Lobby,
            RoomPhase::Collect,
            RoomPhase::Guessing,
            RoomPhase::Reveal,
            RoomPhase::Banger,
            RoomPhase::RoundReveal,
            RoomPhase::Finished,
        ] {
            let mut sm = RoomStateMachine::resume(phase);
            assert_eq!(apply(&mut sm, RoomEvent::Restart), RoomPhase::Lobby);
        }
    }

    #[test]
    fn closing_a_round_twice_is_rejected() {
        let mut sm = RoomStateMachine::resume(RoomPhase::Reveal);
        apply(&mut sm, RoomEvent::CloseRound);

        let err = sm.plan(RoomEvent::CloseRound).unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidTransition(InvalidTransition {
                from: RoomPhase::RoundReveal,
                event: RoomEvent::CloseRound,
            })
        );
    }

    #[test]
    fn skipping_phases_is_rejected() {
        let mut sm = RoomStateMachine::new();
        assert!(matches!(
            sm.plan(RoomEvent::StartRound),
            Err(PlanError::InvalidTransition(_))
        ));
        let mut sm = RoomStateMachine::resume(RoomPhase::Guessing);
        assert!(sm.plan(RoomEvent::NextSong).is_err());
        assert!(sm.plan(RoomEvent::CloseRound).is_err());
    }

    #[test]
    fn only_one_plan_may_be_pending() {
        let mut sm = RoomStateMachine::new();
        let plan = sm.plan(RoomEvent::StartGame).unwrap();
        assert_eq!(sm.plan(RoomEvent::Restart).unwrap_err(), PlanError::AlreadyPending);
        assert_eq!(sm.snapshot().pending, Some(RoomPhase::Collect));
        sm.abort(plan.id).unwrap();
        assert_eq!(sm.phase(), RoomPhase::Lobby);
        assert!(sm.snapshot().pending.is_none());
    }

    #[test]
    fn apply_with_wrong_id_keeps_plan_pending() {
        let mut sm = RoomStateMachine::new();
        let plan = sm.plan(RoomEvent::StartGame).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap(), RoomPhase::Collect);
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RoomPhase::RoundReveal).unwrap(),
            serde_json::json!("roundreveal")
        );
        let parsed: RoomPhase = serde_json::from_value(serde_json::json!("banger")).unwrap();
        assert_eq!(parsed, RoomPhase::Banger);
    }
}
