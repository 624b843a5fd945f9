//! Property tests over random order flows
//!
//! Each case submits a random sequence of orders (with passes and
//! cancellations mixed in) and then checks the invariants that must
//! hold for every order and every pair.

use std::{collections::HashMap, sync::Arc};

use ccq_matching::{
	FundInfo, FundMatchingService, FundScope, ManualClock, MatchingError, MemoryFundDirectory,
	Order, OrderCommand, OrderStatus, PairSource, PartialFillTracker, Side, config::MatchingConfig,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

const FUND: &str = "VFMVF1";

#[derive(Debug, Clone)]
enum Step {
	Submit { side: Side, price: i64, units: i64 },
	Pass,
	Cancel(usize),
}

fn step() -> impl Strategy<Value = Step> {
	prop_oneof![
		6 => (any::<bool>(), 95i64..=105, 1i64..=50).prop_map(|(buy, price, units)| Step::Submit {
			side: if buy { Side::Buy } else { Side::Sell },
			price: price * 100,
			units,
		}),
		2 => Just(Step::Pass),
		1 => (0usize..64).prop_map(Step::Cancel),
	]
}

fn run_flow(steps: &[Step]) -> (FundMatchingService, Vec<String>) {
	let directory = Arc::new(MemoryFundDirectory::new());
	directory.register_fund(FundInfo {
		fund_id: FUND.to_string(),
		ticker: "vfmvf1".to_string(),
		current_nav: Decimal::from(10_000),
	});
	let clock = Arc::new(ManualClock::new(0));
	let service = FundMatchingService::new(&MatchingConfig::default(), directory, clock.clone());

	let mut order_ids = Vec::new();
	for step in steps {
		clock.advance(1);
		match step {
			Step::Submit { side, price, units } => {
				let order = service
					.submit_order(OrderCommand::new(
						FUND,
						*side,
						Decimal::from(*price),
						Decimal::from(*units),
						"investor",
					))
					.unwrap();
				order_ids.push(order.order_id);
			}
			Step::Pass => {
				service.run_matching_pass(FundScope::All).unwrap();
			}
			Step::Cancel(n) => {
				if let Some(order_id) = order_ids.get(n % order_ids.len().max(1)) {
					// Terminal orders report OrderNotFound, which is fine here
					let _ = service.cancel_order(order_id);
				}
			}
		}
	}
	service.run_matching_pass(FundScope::All).unwrap();
	(service, order_ids)
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn matched_units_equal_pair_totals(steps in prop::collection::vec(step(), 1..60)) {
		let (service, order_ids) = run_flow(&steps);

		for order_id in &order_ids {
			let order = service.order(order_id).unwrap();
			let total: Decimal = service
				.pairs_for_order(order_id)
				.iter()
				.map(|p| p.matched_quantity)
				.sum();
			prop_assert_eq!(order.matched_units, total);
			prop_assert!(order.matched_units <= order.units);
			prop_assert_eq!(
				order.status == OrderStatus::Completed,
				order.remaining_units() == Decimal::ZERO
			);
		}
	}

	#[test]
	fn book_pairs_respect_limit_prices(steps in prop::collection::vec(step(), 1..60)) {
		let (service, order_ids) = run_flow(&steps);
		let orders: HashMap<String, Order> = order_ids
			.iter()
			.filter_map(|id| service.order(id).map(|o| (id.clone(), o)))
			.collect();

		for pair in service.pairs_for_fund(FUND) {
			prop_assert_eq!(pair.source, PairSource::Book);
			let buy = &orders[&pair.buy_order_id];
			let sell = &orders[&pair.sell_order_id];
			prop_assert!(buy.price >= sell.price);
			prop_assert!(pair.match_price == buy.price || pair.match_price == sell.price);
			prop_assert!(pair.matched_quantity > Decimal::ZERO);
		}
	}

	#[test]
	fn book_is_uncrossed_after_a_pass(steps in prop::collection::vec(step(), 1..60)) {
		let (service, _) = run_flow(&steps);
		let snapshot = service.get_order_book_snapshot(FUND).unwrap();

		if let (Some(bid), Some(ask)) = (snapshot.buy_orders.first(), snapshot.sell_orders.first()) {
			prop_assert!(bid.price < ask.price);
		}
		let again = service.run_matching_pass(FundScope::Fund(FUND.to_string())).unwrap();
		prop_assert_eq!(again.pairs_created, 0);
	}

	#[test]
	fn cancelled_orders_keep_their_fills(steps in prop::collection::vec(step(), 1..60)) {
		let (service, order_ids) = run_flow(&steps);

		for order_id in &order_ids {
			let order = service.order(order_id).unwrap();
			if order.status == OrderStatus::Cancelled {
				prop_assert!(order.remaining_units() > Decimal::ZERO);
				prop_assert_eq!(
					service.pairs_for_order(order_id).iter().map(|p| p.matched_quantity).sum::<Decimal>(),
					order.matched_units
				);
			}
		}
	}

	#[test]
	fn fills_never_exceed_remaining(units in 1i64..1_000, filled in 0i64..1_000, extra in 1i64..100) {
		prop_assume!(filled < units);
		let mut order = Order {
			order_id: "ord_prop".to_string(),
			fund_id: FUND.to_string(),
			side: Side::Buy,
			price: Decimal::from(10_000),
			units: Decimal::from(units),
			matched_units: Decimal::ZERO,
			status: OrderStatus::Pending,
			owner_id: "investor".to_string(),
			created_at: 0,
			sequence: 0,
		};
		if filled > 0 {
			PartialFillTracker::apply_fill(&mut order, Decimal::from(filled)).unwrap();
		}
		let before = order.clone();

		let too_much = order.remaining_units() + Decimal::from(extra);
		let result = PartialFillTracker::apply_fill(&mut order, too_much);
		let is_overfill = matches!(result, Err(MatchingError::Overfill { .. }));
		prop_assert!(is_overfill);
		prop_assert_eq!(order, before);
	}
}
