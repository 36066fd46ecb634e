//! Incremental collection loop.
//!
//! For every account the most recent `fetch_limit` items are requested. A batch
//! in which nothing predates today may not reach back far enough, so the limit
//! is doubled and the account refetched, up to the configured ceilings. Once a
//! batch is deep enough it is reduced to the items dated before today.

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::{Config, LimitScope};
use crate::error::Result;
use crate::platform::{SocialApi, Timestamped, local_date};
use crate::table::{Row, Table};

#[derive(Debug, Clone, Copy)]
pub struct LimitPolicy {
    pub start_limit: usize,
    pub max_limit: usize,
    pub max_doublings: u32,
    pub scope: LimitScope,
}

impl LimitPolicy {
    pub fn from_config(config: &Config, start_limit: usize) -> Self {
        Self {
            start_limit,
            max_limit: config.max_fetch_limit,
            max_doublings: config.max_doublings,
            scope: config.limit_scope,
        }
    }
}

pub struct Collector<A: SocialApi> {
    api: A,
    policy: LimitPolicy,
    fetch_limit: usize,
    today: NaiveDate,
}

impl<A: SocialApi> Collector<A> {
    pub fn new(api: A, policy: LimitPolicy) -> Self {
        Self {
            api,
            fetch_limit: policy.start_limit,
            policy,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn collect_all(&mut self, accounts: &[String]) -> Result<Table> {
        let platform = self.api.platform();
        let mut table = Table::new(platform.columns());

        for account in accounts {
            let rows = match self.collect_account(account).await {
                Ok(items) => items
                    .iter()
                    .map(|item| self.api.project(item))
                    .collect::<Result<Vec<Row>>>(),
                Err(e) => Err(e),
            };

            match rows {
                Ok(rows) => {
                    info!("{platform} {account}: {} new rows", rows.len());
                    for row in rows {
                        table.append(row)?;
                    }
                }
                Err(e) => warn!("{platform} {account}: skipped, {e}"),
            }
        }

        Ok(table)
    }

    /// Items of `account` dated before today, from a batch deep enough to cover today.
    pub async fn collect_account(&mut self, account: &str) -> Result<Vec<A::Item>> {
        if self.policy.scope == LimitScope::Account {
            self.fetch_limit = self.policy.start_limit;
        }

        let mut doublings = 0;
        loop {
            let items = self.api.fetch_recent(account, self.fetch_limit).await?;
            debug!(
                "{account}: fetched {} items with limit {}",
                items.len(),
                self.fetch_limit
            );

            if items.is_empty() || !needs_more_data(&items, self.today)? {
                return filter_before_today(items, self.today);
            }

            let next = self.fetch_limit.saturating_mul(2).min(self.policy.max_limit);
            if doublings >= self.policy.max_doublings || next <= self.fetch_limit {
                warn!(
                    "{account}: nothing older than today within limit {} after {doublings} doublings, giving up",
                    self.fetch_limit
                );
                return filter_before_today(items, self.today);
            }

            debug!("{account}: raising fetch limit {} -> {next}", self.fetch_limit);
            self.fetch_limit = next;
            doublings += 1;
        }
    }
}

/// True when no item in the batch predates `today`.
pub fn needs_more_data<T: Timestamped>(items: &[T], today: NaiveDate) -> Result<bool> {
    for item in items {
        if local_date(item.created_utc()?)? < today {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Keeps only items whose local date is before `today`, preserving order.
pub fn filter_before_today<T: Timestamped>(items: Vec<T>, today: NaiveDate) -> Result<Vec<T>> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if local_date(item.created_utc()?)? < today {
            kept.push(item);
        }
    }
    Ok(kept)
}
