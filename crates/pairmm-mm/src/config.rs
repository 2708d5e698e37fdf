//! Market making configuration.

use pairmm_core::{CoreError, Price, Side, Volume};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Market making configuration.
///
/// Prices are in the venue's minimum price unit, volumes in lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerConfig {
    /// Price grid of the tradeable instrument.
    #[serde(default = "default_tick_size")]
    pub tick_size: u64,

    /// Volume of each ladder order.
    #[serde(default = "default_lot_size")]
    pub lot_size: u64,

    /// Absolute bound on net position.
    #[serde(default = "default_position_limit")]
    pub position_limit: u64,

    /// Number of ladder levels per side.
    #[serde(default = "default_ladder_depth")]
    pub ladder_depth: u32,

    /// Extra distance from the reference best price, in ticks.
    #[serde(default = "default_additional_spread_ticks")]
    pub additional_spread_ticks: u64,

    /// Position (absolute) beyond which quotes are skewed.
    #[serde(default = "default_skew_threshold")]
    pub skew_threshold: u64,

    /// Excess position per tick of skew.
    /// 10 moves quotes one tick per 10 lots; 25 per 2.5 lots of a 10-lot order.
    #[serde(default = "default_skew_volume_per_tick")]
    pub skew_volume_per_tick: u64,

    /// Lowest price the venue accepts.
    #[serde(default = "default_min_bid")]
    pub min_bid: u64,

    /// Highest price the venue accepts.
    #[serde(default = "default_max_ask")]
    pub max_ask: u64,

    /// Take crossed tradeable/reference books with fill-and-kill orders.
    #[serde(default)]
    pub cross_arbitrage_enabled: bool,

    /// Taker fee as a fraction of notional; a cross must beat it.
    #[serde(default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            tick_size: default_tick_size(),
            lot_size: default_lot_size(),
            position_limit: default_position_limit(),
            ladder_depth: default_ladder_depth(),
            additional_spread_ticks: default_additional_spread_ticks(),
            skew_threshold: default_skew_threshold(),
            skew_volume_per_tick: default_skew_volume_per_tick(),
            min_bid: default_min_bid(),
            max_ask: default_max_ask(),
            cross_arbitrage_enabled: false,
            taker_fee_rate: default_taker_fee_rate(),
        }
    }
}

impl MakerConfig {
    /// Check parameters that would make quoting meaningless.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tick_size == 0 {
            return Err(CoreError::InvalidConfig("tick_size must be positive".into()));
        }
        if self.lot_size == 0 {
            return Err(CoreError::InvalidConfig("lot_size must be positive".into()));
        }
        if self.ladder_depth == 0 {
            return Err(CoreError::InvalidConfig(
                "ladder_depth must be positive".into(),
            ));
        }
        if self.skew_volume_per_tick == 0 {
            return Err(CoreError::InvalidConfig(
                "skew_volume_per_tick must be positive".into(),
            ));
        }
        if self.max_ask <= self.min_bid {
            return Err(CoreError::InvalidConfig(format!(
                "max_ask {} must exceed min_bid {}",
                self.max_ask, self.min_bid
            )));
        }
        if self.taker_fee_rate.is_sign_negative() {
            return Err(CoreError::InvalidConfig(
                "taker_fee_rate must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn lot(&self) -> Volume {
        Volume::new(self.lot_size)
    }

    /// Additional spread in price units.
    pub fn additional_spread(&self) -> i64 {
        (self.additional_spread_ticks * self.tick_size) as i64
    }

    /// Lowest on-grid price strictly above the venue minimum.
    pub fn min_bid_nearest_tick(&self) -> Price {
        Price::new(self.min_bid + self.tick_size).round_down_to_tick(self.tick_size)
    }

    /// Highest on-grid price not above the venue maximum.
    pub fn max_ask_nearest_tick(&self) -> Price {
        Price::new(self.max_ask).round_down_to_tick(self.tick_size)
    }

    /// Limit price that crosses any reference book for a hedge on `side`.
    pub fn hedge_price(&self, side: Side) -> Price {
        match side {
            Side::Buy => self.max_ask_nearest_tick(),
            Side::Sell => self.min_bid_nearest_tick(),
        }
    }
}

fn default_tick_size() -> u64 {
    100
}
fn default_lot_size() -> u64 {
    10
}
fn default_position_limit() -> u64 {
    100
}
fn default_ladder_depth() -> u32 {
    5
}
fn default_additional_spread_ticks() -> u64 {
    1
}
fn default_skew_threshold() -> u64 {
    50
}
fn default_skew_volume_per_tick() -> u64 {
    10
}
fn default_min_bid() -> u64 {
    1
}
fn default_max_ask() -> u64 {
    2_147_483_647
}
fn default_taker_fee_rate() -> Decimal {
    dec!(0.0002)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MakerConfig::default();
        assert_eq!(config.tick_size, 100);
        assert_eq!(config.lot_size, 10);
        assert_eq!(config.position_limit, 100);
        assert_eq!(config.ladder_depth, 5);
        assert_eq!(config.additional_spread_ticks, 1);
        assert_eq!(config.skew_threshold, 50);
        assert_eq!(config.skew_volume_per_tick, 10);
        assert!(!config.cross_arbitrage_enabled);
        assert_eq!(config.taker_fee_rate, dec!(0.0002));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde_defaults() {
        let toml_str = r#"
ladder_depth = 3
cross_arbitrage_enabled = true
taker_fee_rate = "0.0005"
"#;
        let config: MakerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ladder_depth, 3);
        assert!(config.cross_arbitrage_enabled);
        assert_eq!(config.taker_fee_rate, dec!(0.0005));
        assert_eq!(config.tick_size, 100);
        assert_eq!(config.max_ask, 2_147_483_647);
    }

    #[test]
    fn test_hedge_prices_on_grid() {
        let config = MakerConfig::default();
        assert_eq!(config.hedge_price(Side::Sell), Price::new(100));
        assert_eq!(config.hedge_price(Side::Buy), Price::new(2_147_483_600));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_tick = MakerConfig {
            tick_size: 0,
            ..Default::default()
        };
        assert!(zero_tick.validate().is_err());

        let inverted = MakerConfig {
            min_bid: 500,
            max_ask: 400,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let no_skew_step = MakerConfig {
            skew_volume_per_tick: 0,
            ..Default::default()
        };
        assert!(no_skew_step.validate().is_err());
    }
}
