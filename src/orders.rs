use crate::config::BotConfig;
use crate::models::{generate_order_id, Order, OrderSide, OrderStatus};
use chrono::{DateTime, Utc};
use log::{error, info};
use std::collections::HashMap;
use thiserror::Error;

/// Fills within this many units of the request count as complete.
pub const FILL_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    UnknownOrder(String),
    #[error("order {id} is {status} and cannot be cancelled")]
    NotPending { id: String, status: &'static str },
}

/// Simulated broker: market orders are created Pending and filled synchronously.
#[derive(Debug)]
pub struct OrderExecutor {
    slippage_rate: f64,
    order_counter: u64,
    open_orders: HashMap<String, Order>,
    order_history: Vec<Order>,
}

impl OrderExecutor {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            slippage_rate: config.slippage_rate.clamp(0.0, config.max_slippage.max(0.0)),
            order_counter: 0,
            open_orders: HashMap::new(),
            order_history: Vec::new(),
        }
    }

    pub fn create_order(
        &mut self,
        side: OrderSide,
        symbol: &str,
        quantity: f64,
        price: f64,
        time: DateTime<Utc>,
    ) -> Order {
        self.order_counter += 1;
        let order = Order {
            id: generate_order_id(side, symbol, self.order_counter),
            side,
            symbol: symbol.to_string(),
            quantity,
            price,
            status: OrderStatus::Pending,
            filled_quantity: 0.0,
            created_at: time,
            filled_at: None,
            execution_price: None,
        };

        info!(
            "Order created: {} {} {:.6} @ {:.4}",
            order.id,
            side.as_str(),
            quantity,
            price
        );
        self.open_orders.insert(order.id.clone(), order.clone());
        order
    }

    /// Price a market order actually trades at: buys pay up, exits give up.
    pub fn fill_price(&self, side: OrderSide, price: f64) -> f64 {
        if side.is_exit() {
            price * (1.0 - self.slippage_rate)
        } else {
            price * (1.0 + self.slippage_rate)
        }
    }

    pub fn fill(
        &mut self,
        order_id: &str,
        execution_price: f64,
        filled_quantity: Option<f64>,
        time: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let Some(mut order) = self.open_orders.remove(order_id) else {
            error!("Order {} not found", order_id);
            return Err(OrderError::UnknownOrder(order_id.to_string()));
        };

        let filled = filled_quantity.unwrap_or(order.quantity);
        order.filled_quantity = filled;
        order.execution_price = Some(execution_price);
        order.filled_at = Some(time);
        order.status = if (filled - order.quantity).abs() < FILL_TOLERANCE {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        info!(
            "Order {}: {} {:.6} @ {:.4}",
            order.status.as_str(),
            order.id,
            filled,
            execution_price
        );
        self.order_history.push(order.clone());
        Ok(order)
    }

    /// Creates an order and fills it in full at the slipped market price.
    pub fn execute_market(
        &mut self,
        side: OrderSide,
        symbol: &str,
        quantity: f64,
        price: f64,
        time: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let order = self.create_order(side, symbol, quantity, price, time);
        let execution_price = self.fill_price(side, price);
        self.fill(&order.id, execution_price, None, time)
    }

    pub fn cancel(&mut self, order_id: &str) -> Result<Order, OrderError> {
        let Some(mut order) = self.open_orders.remove(order_id) else {
            if let Some(done) = self.order_history.iter().find(|o| o.id == order_id) {
                return Err(OrderError::NotPending {
                    id: order_id.to_string(),
                    status: done.status.as_str(),
                });
            }
            error!("Order {} not found", order_id);
            return Err(OrderError::UnknownOrder(order_id.to_string()));
        };

        order.status = OrderStatus::Cancelled;
        info!("Order cancelled: {} ({})", order.id, order.side.as_str());
        self.order_history.push(order.clone());
        Ok(order)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.open_orders.values()
    }

    pub fn order_history(&self) -> &[Order] {
        &self.order_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn created_orders_are_pending_with_sequential_ids() {
        let mut executor = OrderExecutor::new(&BotConfig::default());
        let first = executor.create_order(OrderSide::Buy, "BTC/USD", 1.0, 100.0, now());
        let second = executor.create_order(OrderSide::Close, "BTC/USD", 1.0, 101.0, now());

        assert_eq!(first.id, "BUY_BTC/USD_1");
        assert_eq!(second.id, "CLOSE_BTC/USD_2");
        assert_eq!(first.status, OrderStatus::Pending);
        assert_eq!(executor.open_orders().count(), 2);
    }

    #[test]
    fn full_fill_moves_order_to_history() {
        let mut executor = OrderExecutor::new(&BotConfig::default());
        let order = executor.create_order(OrderSide::Buy, "BTC/USD", 2.0, 100.0, now());
        let filled = executor.fill(&order.id, 100.0, None, now()).unwrap();

        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(filled.filled_quantity, 2.0);
        assert_eq!(filled.execution_price, Some(100.0));
        assert_eq!(executor.open_orders().count(), 0);
        assert_eq!(executor.order_history().len(), 1);
    }

    #[test]
    fn short_fill_is_partial() {
        let mut executor = OrderExecutor::new(&BotConfig::default());
        let order = executor.create_order(OrderSide::Buy, "BTC/USD", 2.0, 100.0, now());
        let filled = executor.fill(&order.id, 100.0, Some(1.5), now()).unwrap();
        assert_eq!(filled.status, OrderStatus::PartiallyFilled);

        let order = executor.create_order(OrderSide::Buy, "BTC/USD", 2.0, 100.0, now());
        let filled = executor.fill(&order.id, 100.0, Some(1.9995), now()).unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
    }

    #[test]
    fn unknown_order_is_reported_without_side_effects() {
        let mut executor = OrderExecutor::new(&BotConfig::default());
        let err = executor
            .fill("BUY_BTC/USD_99", 100.0, None, now())
            .unwrap_err();
        assert_eq!(err, OrderError::UnknownOrder("BUY_BTC/USD_99".to_string()));
        assert!(executor.order_history().is_empty());
    }

    #[test]
    fn fills_are_terminal() {
        let mut executor = OrderExecutor::new(&BotConfig::default());
        let order = executor.create_order(OrderSide::Buy, "BTC/USD", 1.0, 100.0, now());
        executor.fill(&order.id, 100.0, None, now()).unwrap();

        assert!(executor.fill(&order.id, 90.0, None, now()).is_err());
        assert!(matches!(
            executor.cancel(&order.id),
            Err(OrderError::NotPending { .. })
        ));
        assert_eq!(executor.order_history().len(), 1);
        assert_eq!(executor.order_history()[0].execution_price, Some(100.0));
    }

    #[test]
    fn cancel_moves_pending_order_to_history() {
        let mut executor = OrderExecutor::new(&BotConfig::default());
        let order = executor.create_order(OrderSide::Buy, "BTC/USD", 1.0, 100.0, now());
        let cancelled = executor.cancel(&order.id).unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(executor.open_orders().count(), 0);
        assert!(executor.fill(&order.id, 100.0, None, now()).is_err());
    }

    #[test]
    fn slippage_moves_fills_against_the_order() {
        let config = BotConfig {
            slippage_rate: 0.01,
            ..BotConfig::default()
        };
        let mut executor = OrderExecutor::new(&config);
        assert!((executor.fill_price(OrderSide::Buy, 100.0) - 101.0).abs() < 1e-9);
        assert!((executor.fill_price(OrderSide::Sell, 100.0) - 99.0).abs() < 1e-9);

        let order = executor
            .execute_market(OrderSide::Close, "BTC/USD", 1.0, 200.0, now())
            .unwrap();
        assert_eq!(order.price, 200.0);
        assert!((order.execution_price.unwrap() - 198.0).abs() < 1e-9);

        let frictionless = OrderExecutor::new(&BotConfig::default());
        assert_eq!(frictionless.fill_price(OrderSide::Buy, 123.45), 123.45);
    }
}
