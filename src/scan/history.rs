use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::AcceptedResult;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum HistoryOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// The most recently accepted results, bounded; oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct RecentHistory {
    entries: VecDeque<AcceptedResult>,
    limit: usize,
    order: HistoryOrder,
}

impl RecentHistory {
    pub fn new(limit: usize, order: HistoryOrder) -> Self {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
            order,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, result: AcceptedResult) {
        self.entries.push_back(result);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in display order.
    pub fn entries(&self) -> Vec<AcceptedResult> {
        match self.order {
            HistoryOrder::OldestFirst => self.entries.iter().cloned().collect(),
            HistoryOrder::NewestFirst => self.entries.iter().rev().cloned().collect(),
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.entries().into_iter().map(|entry| entry.payload).collect()
    }
}
