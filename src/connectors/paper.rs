// src/connectors/paper.rs
use crate::connectors::traits::ExecutionHandler;
use crate::types::{OrderRequest, OrderResult, Side, Wallet};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Simulated execution: every order fills at its requested price against an in-memory wallet.
pub struct PaperExecution {
    wallet: Mutex<Wallet>,
}

impl PaperExecution {
    pub fn new(quote_currency: &str, quote_balance: Decimal) -> Self {
        let mut wallet = Wallet::new();
        wallet.insert(quote_currency.to_string(), quote_balance);
        Self {
            wallet: Mutex::new(wallet),
        }
    }
}

#[async_trait]
impl ExecutionHandler for PaperExecution {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let order_id = Uuid::new_v4().to_string();
        let notional = request.amount * request.price;
        let mut wallet = self.wallet.lock().await;

        let (spend_currency, spend_amount, receive_currency, receive_amount) = match request.side {
            Side::Buy => (
                &request.quote_currency,
                notional,
                &request.base_currency,
                request.amount,
            ),
            Side::Sell => (
                &request.base_currency,
                request.amount,
                &request.quote_currency,
                notional,
            ),
        };

        let available = wallet.get(spend_currency).copied().unwrap_or_default();
        if available < spend_amount {
            return Ok(OrderResult::rejected(
                order_id,
                format!(
                    "insufficient {} balance: {} < {}",
                    spend_currency, available, spend_amount
                ),
            ));
        }

        let remaining = available - spend_amount;
        if remaining.is_zero() {
            wallet.remove(spend_currency);
        } else {
            wallet.insert(spend_currency.clone(), remaining);
        }
        *wallet.entry(receive_currency.clone()).or_default() += receive_amount;

        info!(
            "Paper {:?} filled: {} {} @ {} (id {})",
            request.side, request.amount, request.symbol, request.price, order_id
        );
        Ok(OrderResult::filled(order_id, request.price, request.amount))
    }

    async fn get_available_balances(&self) -> Result<Wallet> {
        Ok(self.wallet.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderType;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(side: Side, amount: &str, price: &str) -> OrderRequest {
        OrderRequest {
            symbol: "SOLUSD".to_string(),
            base_currency: "SOL".to_string(),
            quote_currency: "USD".to_string(),
            side,
            order_type: OrderType::Limit,
            amount: dec(amount),
            price: dec(price),
        }
    }

    #[tokio::test]
    async fn test_round_trip_moves_balances() {
        let paper = PaperExecution::new("USD", dec("1000"));

        let buy = paper.place_order(&order(Side::Buy, "0.48", "103.1")).await.unwrap();
        assert!(buy.is_success());
        let wallet = paper.get_available_balances().await.unwrap();
        assert_eq!(wallet["USD"], dec("950.512"));
        assert_eq!(wallet["SOL"], dec("0.48"));

        let sell = paper.place_order(&order(Side::Sell, "0.48", "105")).await.unwrap();
        assert!(sell.is_success());
        let wallet = paper.get_available_balances().await.unwrap();
        assert_eq!(wallet["USD"], dec("1000.912"));
        assert!(!wallet.contains_key("SOL"));
    }

    #[tokio::test]
    async fn test_rejects_when_balance_is_short() {
        let paper = PaperExecution::new("USD", dec("10"));

        let buy = paper.place_order(&order(Side::Buy, "1", "103")).await.unwrap();
        assert!(!buy.is_success());

        let sell = paper.place_order(&order(Side::Sell, "1", "103")).await.unwrap();
        assert!(!sell.is_success());
        assert_eq!(paper.get_available_balances().await.unwrap()["USD"], dec("10"));
    }
}
