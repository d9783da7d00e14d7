//! Per-player time control.
//!
//! Each player owns a cumulative budget that only drains while it is
//! their turn and the game is in progress. Time is charged lazily: the
//! clock remembers when the current turn started and settles the
//! difference whenever it is stopped. The room actor additionally sleeps
//! until [`TurnClock::deadline`] so exhaustion is noticed without waiting
//! for the next move.
//!
//! All instants are [`tokio::time::Instant`], so tests can pause and
//! advance time deterministically.

use std::time::Duration;

use noughts_protocol::{RemainingTime, Symbol, TimeControlView};
use tokio::time::{self, Instant};

#[derive(Debug, Clone)]
pub struct TurnClock {
    budget: Duration,
    remaining: [Duration; 2],
    /// The player whose time is draining, and since when.
    running: Option<(Symbol, Instant)>,
}

impl TurnClock {
    /// A stopped clock with `budget` for each player.
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            remaining: [budget; 2],
            running: None,
        }
    }

    pub fn remaining(&self, symbol: Symbol) -> Duration {
        self.remaining[symbol.index()]
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts draining `symbol`'s budget from `now`. Any turn already
    /// running is settled first.
    pub fn start(&mut self, symbol: Symbol, now: Instant) {
        self.stop(now);
        self.running = Some((symbol, now));
    }

    /// Stops the clock and charges the running player for the time since
    /// their turn started, floored at zero.
    ///
    /// Returns the charged player and whether their budget is now spent.
    pub fn stop(&mut self, now: Instant) -> Option<(Symbol, bool)> {
        let (symbol, since) = self.running.take()?;
        let slot = &mut self.remaining[symbol.index()];
        *slot = slot.saturating_sub(now.saturating_duration_since(since));
        Some((symbol, slot.is_zero()))
    }

    /// When the running player's budget runs out, if the clock is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.running
            .map(|(symbol, since)| since + self.remaining[symbol.index()])
    }

    /// Restores both budgets and stops the clock.
    pub fn refill(&mut self) {
        self.remaining = [self.budget; 2];
        self.running = None;
    }

    /// The clock as shown to clients.
    pub fn view(&self) -> TimeControlView {
        TimeControlView {
            per_move_secs: self.budget.as_secs(),
            remaining: RemainingTime {
                x: self.remaining(Symbol::X).as_secs_f64(),
                o: self.remaining(Symbol::O).as_secs_f64(),
            },
        }
    }
}

/// Sleeps until `deadline`, or forever when there is none.
///
/// Meant to sit in a `tokio::select!` next to the command mailbox: a
/// `None` deadline simply never wins.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_secs(10);

    #[test]
    fn test_stopped_clock_has_no_deadline() {
        let clock = TurnClock::new(BUDGET);
        assert!(!clock.is_running());
        assert_eq!(clock.deadline(), None);
        assert_eq!(clock.remaining(Symbol::X), BUDGET);
    }

    #[test]
    fn test_stop_charges_running_player_only() {
        let t0 = Instant::now();
        let mut clock = TurnClock::new(BUDGET);

        clock.start(Symbol::X, t0);
        let charged = clock.stop(t0 + Duration::from_secs(3));

        assert_eq!(charged, Some((Symbol::X, false)));
        assert_eq!(clock.remaining(Symbol::X), Duration::from_secs(7));
        assert_eq!(clock.remaining(Symbol::O), BUDGET);
    }

    #[test]
    fn test_budget_is_cumulative_across_turns() {
        let t0 = Instant::now();
        let mut clock = TurnClock::new(BUDGET);

        clock.start(Symbol::X, t0);
        clock.start(Symbol::O, t0 + Duration::from_secs(4));
        clock.start(Symbol::X, t0 + Duration::from_secs(5));
        clock.stop(t0 + Duration::from_secs(9));

        assert_eq!(clock.remaining(Symbol::X), Duration::from_secs(2));
        assert_eq!(clock.remaining(Symbol::O), Duration::from_secs(9));
    }

    #[test]
    fn test_overrun_floors_at_zero() {
        let t0 = Instant::now();
        let mut clock = TurnClock::new(BUDGET);

        clock.start(Symbol::X, t0);
        let charged = clock.stop(t0 + Duration::from_secs(11));

        assert_eq!(charged, Some((Symbol::X, true)));
        assert_eq!(clock.remaining(Symbol::X), Duration::ZERO);
    }

    #[test]
    fn test_deadline_tracks_remaining_budget() {
        let t0 = Instant::now();
        let mut clock = TurnClock::new(BUDGET);

        clock.start(Symbol::O, t0);
        assert_eq!(clock.deadline(), Some(t0 + BUDGET));
    }

    #[test]
    fn test_refill_restores_budgets() {
        let t0 = Instant::now();
        let mut clock = TurnClock::new(BUDGET);
        clock.start(Symbol::X, t0);
        clock.stop(t0 + Duration::from_secs(6));

        clock.refill();

        assert_eq!(clock.remaining(Symbol::X), BUDGET);
        assert!(!clock.is_running());
        assert_eq!(clock.view().per_move_secs, 10);
        assert_eq!(clock.view().remaining.x, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_none_never_fires() {
        let fired = tokio::time::timeout(Duration::from_secs(3600), sleep_until(None)).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_fires_at_deadline() {
        let deadline = Instant::now() + Duration::from_secs(5);
        sleep_until(Some(deadline)).await;
        assert!(Instant::now() >= deadline);
    }
}
