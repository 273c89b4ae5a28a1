// storefront/src/pricing.rs

//! Bundle pricing.
//!
//! Photos are sold in packs whose prices are curated by hand rather than derived from a
//! unit price. Carts up to the largest pack are priced by direct lookup; larger carts
//! are priced by the cheapest combination of packs (packs may repeat), which is the
//! minimum-cost variant of coin change:
//!
//! ```text
//! dp[0] = 0
//! dp[n] = min over pack sizes s <= n of dp[n - s] + price(s)
//! ```
//!
//! Pack size 1 always exists, so every `dp[n]` is finite. Arithmetic stays in exact
//! major units and is rounded to minor units once, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
  #[error("price table is empty")]
  Empty,

  #[error("pack of {size} photo(s) has a non-positive price ({price})")]
  NonPositivePrice { size: u32, price: Decimal },
}

/// Prices in major currency units for pack sizes `1..=largest_pack()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
  // prices[i] is the price of a pack of i + 1 photos
  prices: Vec<Decimal>,
}

/// How many packs of a given size make up a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackCount {
  pub size: u32,
  pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
  pub photo_count: u32,
  pub amount_minor_units: i64,
  /// Largest packs first.
  pub packs: Vec<PackCount>,
}

impl PriceTable {
  /// The storefront's standard EUR table for 1 to 20 photos.
  pub fn standard() -> Self {
    Self {
      prices: vec![
        dec!(8),
        dec!(16),
        dec!(20),
        dec!(28),
        dec!(30),
        dec!(38),
        dec!(46),
        dec!(50),
        dec!(58),
        dec!(60),
        dec!(68),
        dec!(76),
        dec!(80),
        dec!(88),
        dec!(90),
        dec!(98),
        dec!(106),
        dec!(110),
        dec!(118),
        dec!(120),
      ],
    }
  }

  /// `prices[i]` is the price of a pack of `i + 1` photos.
  pub fn new(prices: Vec<Decimal>) -> Result<Self, PricingError> {
    if prices.is_empty() {
      return Err(PricingError::Empty);
    }
    for (size, price) in (1u32..).zip(&prices) {
      if *price <= Decimal::ZERO {
        return Err(PricingError::NonPositivePrice { size, price: *price });
      }
    }
    Ok(Self { prices })
  }

  pub fn largest_pack(&self) -> u32 {
    u32::try_from(self.prices.len()).unwrap_or(u32::MAX)
  }

  /// Price of a single pack in major units, if that size is tabulated.
  pub fn pack_price(&self, size: u32) -> Option<Decimal> {
    let index = usize::try_from(size).ok()?.checked_sub(1)?;
    self.prices.get(index).copied()
  }

  /// Total price for `photo_count` photos, in minor units.
  pub fn price_for(&self, photo_count: u32) -> i64 {
    to_minor_units(self.total_major(photo_count))
  }

  /// Like [`price_for`](Self::price_for), with the pack decomposition that produced it.
  pub fn quote(&self, photo_count: u32) -> PriceQuote {
    let (total, sizes) = match self.pack_price(photo_count) {
      Some(price) => (price, vec![photo_count]),
      None if photo_count == 0 => (Decimal::ZERO, Vec::new()),
      None => self.optimal_cover(photo_count),
    };

    let mut packs: Vec<PackCount> = Vec::new();
    let mut sorted = sizes;
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    for size in sorted {
      match packs.last_mut() {
        Some(last) if last.size == size => last.count += 1,
        _ => packs.push(PackCount { size, count: 1 }),
      }
    }

    PriceQuote {
      photo_count,
      amount_minor_units: to_minor_units(total),
      packs,
    }
  }

  fn total_major(&self, photo_count: u32) -> Decimal {
    if photo_count == 0 {
      return Decimal::ZERO;
    }
    match self.pack_price(photo_count) {
      Some(price) => price,
      None => self.optimal_cover(photo_count).0,
    }
  }

  /// Cheapest multiset of pack sizes summing to `photo_count`. Ties go to the larger pack.
  fn optimal_cover(&self, photo_count: u32) -> (Decimal, Vec<u32>) {
    let target = photo_count as usize;
    let mut best = vec![Decimal::ZERO; target + 1];
    let mut choice = vec![0usize; target + 1];

    for n in 1..=target {
      let mut cheapest: Option<(Decimal, usize)> = None;
      for (index, price) in self.prices.iter().enumerate().rev() {
        let size = index + 1;
        if size > n {
          continue;
        }
        let candidate = best[n - size] + *price;
        if cheapest.map_or(true, |(current, _)| candidate < current) {
          cheapest = Some((candidate, size));
        }
      }
      // size 1 always fits, so a candidate always exists
      if let Some((cost, size)) = cheapest {
        best[n] = cost;
        choice[n] = size;
      }
    }

    let mut sizes = Vec::new();
    let mut remaining = target;
    while remaining > 0 && choice[remaining] > 0 {
      sizes.push(choice[remaining] as u32);
      remaining -= choice[remaining];
    }
    (best[target], sizes)
  }
}

impl Default for PriceTable {
  fn default() -> Self {
    Self::standard()
  }
}

/// Rounds a major-unit amount to the cent (half away from zero) and returns minor units.
pub fn to_minor_units(amount: Decimal) -> i64 {
  let mut cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
  cents.rescale(2);
  i64::try_from(cents.mantissa()).unwrap_or(i64::MAX)
}

/// `1234, "eur"` renders as `12.34 EUR`.
pub fn format_minor_units(amount: i64, currency: &str) -> String {
  let sign = if amount < 0 { "-" } else { "" };
  let abs = amount.unsigned_abs();
  format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency.to_ascii_uppercase())
}

/// Prices `photo_count` photos with the standard table.
pub fn price_for(photo_count: u32) -> i64 {
  PriceTable::standard().price_for(photo_count)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tabulated_counts_are_direct_lookups() {
    assert_eq!(price_for(0), 0);
    assert_eq!(price_for(1), 800);
    assert_eq!(price_for(3), 2000);
    assert_eq!(price_for(4), 2800);
    assert_eq!(price_for(20), 12000);
  }

  #[test]
  fn counts_past_the_table_use_the_cheapest_split() {
    assert_eq!(price_for(21), 12800);
    assert_eq!(price_for(25), 15000);
    assert_eq!(price_for(40), 24000);
    assert_eq!(price_for(100), 60000);
  }

  #[test]
  fn quote_reports_packs_largest_first() {
    let quote = PriceTable::standard().quote(45);
    assert_eq!(quote.amount_minor_units, price_for(45));
    assert_eq!(quote.packs.iter().map(|p| p.size * p.count).sum::<u32>(), 45);
    assert_eq!(quote.packs[0], PackCount { size: 20, count: 2 });

    let single = PriceTable::standard().quote(7);
    assert_eq!(single.packs, vec![PackCount { size: 7, count: 1 }]);
    assert!(PriceTable::standard().quote(0).packs.is_empty());
  }

  #[test]
  fn a_cheap_small_pack_beats_linear_pricing() {
    // 3 photos for 10 beats three singles at 5
    let table = PriceTable::new(vec![dec!(5), dec!(9), dec!(10)]).unwrap();
    assert_eq!(table.price_for(4), 1500);
    assert_eq!(table.price_for(6), 2000);
    assert_eq!(table.price_for(7), 2500);
  }

  #[test]
  fn rounding_happens_once_at_the_boundary() {
    // three packs of 0.335 sum to 1.005 and round to 1.01; rounding each pack first would give 1.02
    let table = PriceTable::new(vec![dec!(0.335)]).unwrap();
    assert_eq!(table.price_for(1), 34);
    assert_eq!(table.price_for(3), 101);
    assert_eq!(to_minor_units(dec!(2.5)), 250);
    assert_eq!(to_minor_units(dec!(0.125)), 13);
  }

  #[test]
  fn amounts_render_with_two_decimals() {
    assert_eq!(format_minor_units(12800, "eur"), "128.00 EUR");
    assert_eq!(format_minor_units(5, "usd"), "0.05 USD");
  }

  #[test]
  fn invalid_tables_are_rejected() {
    assert_eq!(PriceTable::new(vec![]), Err(PricingError::Empty));
    assert_eq!(
      PriceTable::new(vec![dec!(1), dec!(0)]),
      Err(PricingError::NonPositivePrice { size: 2, price: dec!(0) })
    );
  }
}
