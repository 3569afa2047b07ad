/// position.rs — Position records and their lifecycle
///
///   add    ──▶ Active ──close──▶ Closed    (record kept)
///                     ╰─delete─▶ Removed   (record dropped from the book)
///
/// Closed and Removed are terminal.  A position never holds market data;
/// `entry_z` is captured once at creation.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::data::normalize_asset;
use crate::error::{ConfigurationError, PositionError};

pub type PositionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Closed,
    Removed,
}

impl PositionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionStatus::Active  => "active",
            PositionStatus::Closed  => "closed",
            PositionStatus::Removed => "removed",
        }
    }
}

/// Long `asset1`, short `asset2`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id:         PositionId,
    pub pair_id:    String,
    pub asset1:     String,
    pub asset2:     String,
    pub entry_z:    f64,
    pub size_usd:   f64,
    pub entry_time: DateTime<Utc>,
    pub status:     PositionStatus,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    fn transition(&mut self, to: PositionStatus) -> Result<(), PositionError> {
        if self.status != PositionStatus::Active {
            return Err(PositionError::InvalidTransition {
                id:   self.id,
                from: self.status.as_str(),
                to:   to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Session-lifetime container of positions, in insertion order.
///
/// Owned by whatever drives evaluation (CLI loop, tests); nothing here is
/// persisted.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: Vec<Position>,
    next_id:   PositionId,
}

impl PositionBook {
    pub fn new() -> Self {
        Self { positions: Vec::new(), next_id: 1 }
    }

    /// Validate and open a new position.  Asset names are normalised
    /// (`" eth "` and `"ETHUSDT"` both become `"ETH"`).
    pub fn add_position(
        &mut self,
        asset1:   &str,
        asset2:   &str,
        entry_z:  f64,
        size_usd: f64,
    ) -> Result<&Position, ConfigurationError> {
        let asset1 = normalize_asset(asset1);
        let asset2 = normalize_asset(asset2);
        if asset1.is_empty() || asset2.is_empty() {
            return Err(ConfigurationError::EmptyAsset);
        }
        if asset1 == asset2 {
            return Err(ConfigurationError::IdenticalAssets(asset1));
        }
        if !entry_z.is_finite() {
            return Err(ConfigurationError::InvalidEntryZ(entry_z));
        }
        if !size_usd.is_finite() || size_usd <= 0.0 {
            return Err(ConfigurationError::InvalidSize(size_usd));
        }

        let id = self.next_id.max(1);
        self.next_id = id + 1;

        let position = Position {
            id,
            pair_id: format!("{asset1}/{asset2}"),
            asset1,
            asset2,
            entry_z,
            size_usd,
            entry_time: Utc::now(),
            status: PositionStatus::Active,
        };
        info!(
            "Added position #{} {} entry_z={:.2} size=${:.2}",
            id, position.pair_id, entry_z, size_usd
        );
        self.positions.push(position);
        Ok(&self.positions[self.positions.len() - 1])
    }

    /// Active → Closed.  The record stays in the book.
    pub fn close_position(&mut self, id: PositionId) -> Result<&Position, PositionError> {
        let idx = self.index_of(id)?;
        let position = &mut self.positions[idx];
        position.transition(PositionStatus::Closed)?;
        info!("Closed position #{} {}", id, position.pair_id);
        Ok(&self.positions[idx])
    }

    /// Active → Removed.  The record is discarded and returned.
    pub fn remove_position(&mut self, id: PositionId) -> Result<Position, PositionError> {
        let idx = self.index_of(id)?;
        self.positions[idx].transition(PositionStatus::Removed)?;
        let removed = self.positions.remove(idx);
        info!("Removed position #{} {}", id, removed.pair_id);
        Ok(removed)
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Active positions in insertion order.
    pub fn list_active_positions(&self) -> Vec<&Position> {
        self.positions.iter().filter(|p| p.is_active()).collect()
    }

    /// Every retained record (active and closed).
    pub fn all(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn index_of(&self, id: PositionId) -> Result<usize, PositionError> {
        self.positions
            .iter()
            .position(|p| p.id == id)
            .ok_or(PositionError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_enters_active_with_pair_id() {
        let mut book = PositionBook::new();
        let p = book.add_position("btc", "ETH", -2.3, 1000.0).unwrap();
        assert_eq!(p.id, 1);
        assert_eq!(p.pair_id, "BTC/ETH");
        assert_eq!(p.status, PositionStatus::Active);
        assert_eq!(p.entry_z, -2.3);
    }

    #[test]
    fn identical_assets_are_rejected() {
        let mut book = PositionBook::new();
        let err = book.add_position("BTC", "btcusdt", 2.0, 100.0).unwrap_err();
        assert_eq!(err, ConfigurationError::IdenticalAssets("BTC".into()));
        assert!(book.is_empty());
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut book = PositionBook::new();
        assert_eq!(book.add_position(" ", "ETH", 1.0, 10.0).unwrap_err(), ConfigurationError::EmptyAsset);
        assert!(matches!(book.add_position("BTC", "ETH", f64::NAN, 10.0), Err(ConfigurationError::InvalidEntryZ(_))));
        assert_eq!(book.add_position("BTC", "ETH", 1.0, 0.0).unwrap_err(), ConfigurationError::InvalidSize(0.0));
    }

    #[test]
    fn close_keeps_record_and_is_terminal() {
        let mut book = PositionBook::new();
        let id = book.add_position("BTC", "ETH", -2.0, 100.0).unwrap().id;
        assert_eq!(book.close_position(id).unwrap().status, PositionStatus::Closed);
        assert_eq!(book.len(), 1);
        assert!(book.list_active_positions().is_empty());

        assert_eq!(
            book.close_position(id).unwrap_err(),
            PositionError::InvalidTransition { id, from: "closed", to: "closed" }
        );
        assert!(matches!(book.remove_position(id), Err(PositionError::InvalidTransition { .. })));
    }

    #[test]
    fn remove_discards_record() {
        let mut book = PositionBook::new();
        let a = book.add_position("BTC", "ETH", -2.0, 100.0).unwrap().id;
        let b = book.add_position("SOL", "AVAX", 2.5, 100.0).unwrap().id;
        let removed = book.remove_position(a).unwrap();
        assert_eq!(removed.status, PositionStatus::Removed);
        assert!(book.get(a).is_none());
        assert_eq!(book.remove_position(a).unwrap_err(), PositionError::NotFound(a));
        assert_eq!(book.list_active_positions()[0].id, b);
    }

    #[test]
    fn active_listing_keeps_insertion_order_and_unique_ids() {
        let mut book = PositionBook::new();
        let ids: Vec<_> = [("BTC", "ETH"), ("SOL", "AVAX"), ("LINK", "DOT")]
            .iter()
            .map(|(a, b)| book.add_position(a, b, 2.0, 50.0).unwrap().id)
            .collect();
        book.remove_position(ids[1]).unwrap();
        let next = book.add_position("ADA", "XRP", 2.0, 50.0).unwrap().id;
        assert!(!ids.contains(&next));

        let listed: Vec<_> = book.list_active_positions().iter().map(|p| p.pair_id.clone()).collect();
        assert_eq!(listed, vec!["BTC/ETH", "LINK/DOT", "ADA/XRP"]);
    }
}
