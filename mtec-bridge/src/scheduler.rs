//! Cadence scheduler: decides which categories are due on a tick
//!
//! `current` is due on every tick. The other categories carry a next-due
//! timestamp that starts at the scheduler's creation time and only moves
//! forward after a successful read, to `read time + cadence`. A failed read
//! leaves it untouched, so the category is retried on the next tick.

use crate::catalog::Category;
use chrono::{DateTime, Local, TimeDelta};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Refresh cadences of the categories with their own schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadences {
    pub config: TimeDelta,
    pub day: TimeDelta,
    pub total: TimeDelta,
}

impl Cadences {
    /// Cadence of a category; `current` has none
    pub fn of(&self, category: Category) -> Option<TimeDelta> {
        match category {
            Category::Config => Some(self.config),
            Category::Current => None,
            Category::Day => Some(self.day),
            Category::Total => Some(self.total),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CadenceScheduler {
    cadences: Cadences,
    next_due: HashMap<Category, DateTime<Local>>,
}

impl CadenceScheduler {
    pub fn new(cadences: Cadences, created_at: DateTime<Local>) -> Self {
        let next_due = Category::ALL
            .into_iter()
            .filter(|c| cadences.of(*c).is_some())
            .map(|c| (c, created_at))
            .collect();
        Self { cadences, next_due }
    }

    pub fn cadences(&self) -> &Cadences {
        &self.cadences
    }

    /// Next eligible read time, `None` for categories read on every tick
    pub fn next_due(&self, category: Category) -> Option<DateTime<Local>> {
        self.next_due.get(&category).copied()
    }

    pub fn is_due(&self, category: Category, now: DateTime<Local>) -> bool {
        match self.next_due.get(&category) {
            Some(due) => now >= *due,
            None => true,
        }
    }

    /// Categories due at `now`, in catalog order
    pub fn due(&self, now: DateTime<Local>) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.is_due(*c, now))
            .collect()
    }

    /// Record a successful read and publish of `category` performed at `read_at`
    pub fn mark_success(&mut self, category: Category, read_at: DateTime<Local>) {
        let Some(cadence) = self.cadences.of(category) else {
            return;
        };
        let candidate = read_at + cadence;
        match self.next_due.get_mut(&category) {
            Some(due) if candidate > *due => {
                *due = candidate;
                debug!("Next {} read due at {}", category, candidate);
            }
            Some(due) => {
                warn!(
                    "Ignoring schedule update for {}: {} is not after {}",
                    category, candidate, due
                );
            }
            None => {
                self.next_due.insert(category, candidate);
            }
        }
    }
}
