// storefront/tests/pricing_properties.rs

use lightbox::pricing::{price_for, PriceTable};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Exhaustive minimum over every multiset of packs, for small counts only.
fn brute_force_cents(table: &PriceTable, n: u32) -> i64 {
  fn go(table: &PriceTable, remaining: u32, max_pack: u32) -> Decimal {
    if remaining == 0 {
      return Decimal::ZERO;
    }
    let mut best: Option<Decimal> = None;
    for size in (1..=max_pack.min(remaining)).rev() {
      let Some(price) = table.pack_price(size) else { continue };
      let candidate = price + go(table, remaining - size, size);
      if best.map_or(true, |b| candidate < b) {
        best = Some(candidate);
      }
    }
    best.unwrap_or(Decimal::MAX)
  }
  lightbox::pricing::to_minor_units(go(table, n, table.largest_pack()))
}

fn arb_table() -> impl Strategy<Value = PriceTable> {
  prop::collection::vec(1u32..5000, 1..8).prop_map(|cents| {
    PriceTable::new(cents.into_iter().map(|c| Decimal::new(i64::from(c), 2)).collect()).unwrap()
  })
}

#[test]
fn standard_table_scenarios() {
  let expected = [
    (1, 800),
    (2, 1600),
    (3, 2000),
    (5, 3000),
    (10, 6000),
    (20, 12000),
    (21, 12800),
    (23, 14000),
    (30, 18000),
    (41, 24800),
  ];
  for (n, cents) in expected {
    assert_eq!(price_for(n), cents, "price for {} photos", n);
  }
}

proptest! {
  #[test]
  fn adding_a_photo_never_lowers_the_price(n in 0u32..400) {
    prop_assert!(price_for(n + 1) >= price_for(n));
  }

  #[test]
  fn standard_table_matches_brute_force(n in 0u32..=40) {
    let table = PriceTable::standard();
    prop_assert_eq!(table.price_for(n), brute_force_cents(&table, n));
  }

  #[test]
  fn past_the_table_any_table_prices_its_cheapest_split(table in arb_table(), extra in 1u32..=16) {
    // within the table the curated price is authoritative, so only compare beyond it
    let n = table.largest_pack() + extra;
    prop_assert_eq!(table.price_for(n), brute_force_cents(&table, n));
  }

  #[test]
  fn pricing_is_deterministic_and_quote_agrees(n in 0u32..600) {
    let table = PriceTable::standard();
    let quote = table.quote(n);
    prop_assert_eq!(table.price_for(n), price_for(n));
    prop_assert_eq!(quote.amount_minor_units, table.price_for(n));
    prop_assert_eq!(quote.packs.iter().map(|p| p.size * p.count).sum::<u32>(), n);
  }

  #[test]
  fn split_cost_bounds_the_total(a in 1u32..200, b in 1u32..200) {
    // pricing a + b together can only match or beat pricing the parts separately
    prop_assert!(price_for(a + b) <= price_for(a) + price_for(b));
  }
}
