//! The six selection engines.
//!
//! Every engine first narrows the candidates to the lowest penalty tier, then
//! applies its own tie-break. None of them raise on an empty input.

use rand::seq::SliceRandom;

use super::{lowest_penalty_tier, Candidate, Selection, SelectionContext, SelectionStrategy};
use crate::registry::Strategy;
use crate::stats::StatsError;

/// Offer the call to the whole lowest penalty tier at once.
#[derive(Debug, Default, Clone, Copy)]
pub struct RingAll;

impl SelectionStrategy for RingAll {
    fn strategy(&self) -> Strategy {
        Strategy::RingAll
    }

    fn select(
        &self,
        _ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError> {
        let tier = lowest_penalty_tier(candidates);
        if tier.is_empty() {
            return Ok(Selection::NoAgent);
        }
        Ok(Selection::Group(tier))
    }
}

/// Member whose last call is the oldest. Never-called members come first.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastRecent;

impl SelectionStrategy for LeastRecent {
    fn strategy(&self) -> Strategy {
        Strategy::LeastRecent
    }

    fn select(
        &self,
        _ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError> {
        // Option orders None before Some, which is exactly "never called first".
        Ok(lowest_penalty_tier(candidates)
            .into_iter()
            .min_by_key(|c| (c.stats.last_call_time, c.member.id))
            .map_or(Selection::NoAgent, Selection::Single))
    }
}

/// Member with the fewest calls taken.
#[derive(Debug, Default, Clone, Copy)]
pub struct FewestCalls;

impl SelectionStrategy for FewestCalls {
    fn strategy(&self) -> Strategy {
        Strategy::FewestCalls
    }

    fn select(
        &self,
        _ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError> {
        Ok(lowest_penalty_tier(candidates)
            .into_iter()
            .min_by_key(|c| (c.stats.calls_taken, c.member.id))
            .map_or(Selection::NoAgent, Selection::Single))
    }
}

/// Uniform random member of the tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct Random;

impl SelectionStrategy for Random {
    fn strategy(&self) -> Strategy {
        Strategy::Random
    }

    fn select(
        &self,
        _ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError> {
        let tier = lowest_penalty_tier(candidates);
        Ok(tier
            .choose(&mut rand::thread_rng())
            .cloned()
            .map_or(Selection::NoAgent, Selection::Single))
    }
}

/// Cycle through the tier using the queue's persistent cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobinMemory;

impl SelectionStrategy for RoundRobinMemory {
    fn strategy(&self) -> Strategy {
        Strategy::RoundRobinMemory
    }

    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError> {
        let mut tier = lowest_penalty_tier(candidates);
        if tier.is_empty() {
            return Ok(Selection::NoAgent);
        }

        let position = ctx.stats.advance_cursor(ctx.queue.id, tier.len())?;
        tracing::trace!(
            queue_id = %ctx.queue.id,
            call_id = ctx.call_id,
            position,
            tier_size = tier.len(),
            "Advanced round-robin cursor"
        );
        Ok(Selection::Single(tier.swap_remove(position)))
    }
}

/// First registered member of the tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct Linear;

impl SelectionStrategy for Linear {
    fn strategy(&self) -> Strategy {
        Strategy::Linear
    }

    fn select(
        &self,
        _ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError> {
        // The tier is ordered by member id.
        Ok(lowest_penalty_tier(candidates)
            .into_iter()
            .next()
            .map_or(Selection::NoAgent, Selection::Single))
    }
}
