// src/connectors/binance.rs
use crate::config::AppConfig;
use crate::connectors::messages::{
    AccountInfo, BinanceErrorBody, BinanceOrderResponse, BinanceTickerEvent, DailyTicker,
    ExchangeInfo, RawKline,
};
use crate::connectors::traits::{ExecutionHandler, MarketData, PriceStream};
use crate::types::{
    interval_code, Candle, MarketSummary, OrderRequest, OrderResult, OrderType, Side, Ticker,
    Wallet,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

pub struct BinanceClient {
    api_key: String,
    secret_key: String,
    http_client: Client,
    base_rest_url: String,
    stream_url: String,
}

impl BinanceClient {
    pub fn new(
        api_key: String,
        secret_key: String,
        base_rest_url: String,
        stream_url: String,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key,
            secret_key,
            http_client,
            base_rest_url: base_rest_url.trim_end_matches('/').to_string(),
            stream_url: stream_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.secret_key.clone(),
            config.rest_url.clone(),
            config.stream_url.clone(),
        )
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> Result<String> {
        let mut params = params;
        let timestamp = Utc::now().timestamp_millis().to_string();
        params.push(("timestamp", timestamp));

        let query_string = serde_urlencoded::to_string(&params)?;
        let signature = sign(&self.secret_key, &query_string)?;

        Ok(format!("{}&signature={}", query_string, signature))
    }

    async fn signed_request(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<Response> {
        let full_query = self.sign_and_build_query(params)?;
        let url = format!("{}{}?{}", self.base_rest_url, endpoint, full_query);

        let response = self
            .http_client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Ok(response)
    }

    async fn send_signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T> {
        let response = self
            .signed_request(method, endpoint, params)
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_rest_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    fn stream_endpoint(&self) -> Result<Url> {
        Ok(Url::parse(&format!("{}/ws/!ticker@arr", self.stream_url))?)
    }
}

fn sign(secret_key: &str, payload: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret_key.as_bytes()).context("Invalid secret key length")?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

/// Request parameters of a spot order: LIMIT IOC when a limit is wanted, MARKET otherwise.
fn order_params(request: &OrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", request.symbol.clone()),
        ("side", side_label(request.side).to_string()),
        ("quantity", request.amount.normalize().to_string()),
        ("newOrderRespType", "RESULT".to_string()),
    ];

    match request.order_type {
        OrderType::Limit => {
            params.push(("type", "LIMIT".to_string()));
            params.push(("timeInForce", "IOC".to_string()));
            params.push(("price", request.price.normalize().to_string()));
        }
        OrderType::Market => params.push(("type", "MARKET".to_string())),
    }
    params
}

fn order_result(resp: BinanceOrderResponse, request: &OrderRequest) -> OrderResult {
    let order_id = resp.order_id.to_string();
    match resp.status.as_str() {
        "FILLED" | "PARTIALLY_FILLED" if resp.executed_qty > Decimal::ZERO => {
            let price = if resp.cummulative_quote_qty > Decimal::ZERO {
                resp.cummulative_quote_qty / resp.executed_qty
            } else {
                request.price
            };
            OrderResult::filled(order_id, price, resp.executed_qty)
        }
        status => OrderResult::rejected(
            order_id,
            format!("{} order for {} ended {}", side_label(request.side), resp.symbol, status),
        ),
    }
}

fn rejection_reason(body: &str) -> String {
    match serde_json::from_str::<BinanceErrorBody>(body) {
        Ok(err) => format!("{} (code {})", err.msg, err.code),
        Err(_) => body.to_string(),
    }
}

fn to_candle(row: RawKline) -> Result<Candle> {
    let (_, open, high, low, close, _, close_time, quote_volume, ..) = row;
    let close_time = Utc
        .timestamp_millis_opt(close_time)
        .single()
        .ok_or_else(|| anyhow!("Invalid kline close time {}", close_time))?;
    Ok(Candle {
        close_time,
        open,
        high,
        low,
        close,
        quote_volume,
    })
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn get_tickers(&self) -> Result<HashMap<String, MarketSummary>> {
        let info: ExchangeInfo = self.get_public("/api/v3/exchangeInfo", &[]).await?;
        let daily: Vec<DailyTicker> = self.get_public("/api/v3/ticker/24hr", &[]).await?;

        let volumes: HashMap<String, Decimal> = daily
            .into_iter()
            .map(|t| (t.symbol, t.quote_volume))
            .collect();

        let tickers = info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| {
                let volume = volumes.get(&s.symbol).copied().unwrap_or_default();
                (
                    s.symbol,
                    MarketSummary {
                        base_currency: s.base_asset,
                        quote_currency: s.quote_asset,
                        volume,
                    },
                )
            })
            .collect();
        Ok(tickers)
    }

    async fn get_candles(&self, symbol: &str, period_secs: u64, limit: u16) -> Result<Vec<Candle>> {
        let interval = interval_code(period_secs)
            .ok_or_else(|| anyhow!("No kline interval for a {}s period", period_secs))?;

        let rows: Vec<RawKline> = self
            .get_public(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
            .with_context(|| format!("Failed to fetch klines for {}", symbol))?;

        rows.into_iter().map(to_candle).collect()
    }
}

#[async_trait]
impl ExecutionHandler for BinanceClient {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let params = order_params(request);
        info!(
            symbol = %request.symbol,
            side = side_label(request.side),
            amount = %request.amount,
            price = %request.price,
            order_type = ?request.order_type,
            "Sending order"
        );

        let response = self
            .signed_request(Method::POST, "/api/v3/order", params)
            .await?;

        let status = response.status();
        // rate limit responses are transport trouble, not a verdict on the order
        if status.is_client_error()
            && status != StatusCode::TOO_MANY_REQUESTS
            && status != StatusCode::IM_A_TEAPOT
        {
            let body = response.text().await.unwrap_or_default();
            let reason = rejection_reason(&body);
            warn!(symbol = %request.symbol, %status, %reason, "Order rejected by exchange");
            return Ok(OrderResult::rejected(String::new(), reason));
        }

        let resp: BinanceOrderResponse = response.error_for_status()?.json().await?;
        Ok(order_result(resp, request))
    }

    async fn get_available_balances(&self) -> Result<Wallet> {
        let account: AccountInfo = self
            .send_signed_request(Method::GET, "/api/v3/account", vec![])
            .await?;

        Ok(account
            .balances
            .into_iter()
            .filter(|b| b.free > Decimal::ZERO)
            .map(|b| (b.asset, b.free))
            .collect())
    }
}

#[async_trait]
impl PriceStream for BinanceClient {
    async fn subscribe_prices(
        &self,
        symbols: Vec<String>,
        sender: mpsc::Sender<Ticker>,
    ) -> Result<()> {
        let url = self.stream_endpoint()?;
        let universe: HashSet<String> = symbols.into_iter().collect();

        info!("Starting ticker stream task for {} symbols", universe.len());

        tokio::spawn(async move {
            let mut retry_delay = Duration::from_secs(1);
            loop {
                match connect_async(url.as_str()).await {
                    Ok((ws_stream, _)) => {
                        info!("Ticker stream connected ({})", url);
                        retry_delay = Duration::from_secs(1);
                        let (_, mut read) = ws_stream.split();

                        while let Some(message) = read.next().await {
                            let text = match message {
                                Ok(Message::Text(text)) => text,
                                Ok(Message::Close(frame)) => {
                                    warn!("Ticker stream closed by server: {:?}", frame);
                                    break;
                                }
                                Ok(_) => continue,
                                Err(e) => {
                                    error!("Ticker stream error: {}", e);
                                    break;
                                }
                            };

                            let events: Vec<BinanceTickerEvent> = match serde_json::from_str(&text)
                            {
                                Ok(events) => events,
                                Err(e) => {
                                    debug!("Skipping unparsable ticker payload: {}", e);
                                    continue;
                                }
                            };

                            for event in events {
                                if !universe.contains(&event.symbol) {
                                    continue;
                                }
                                let ticker = Ticker {
                                    symbol: event.symbol,
                                    last: event.last_price,
                                    bid: event.best_bid,
                                    ask: event.best_ask,
                                    timestamp: event.event_time,
                                };
                                if sender.send(ticker).await.is_err() {
                                    info!("Ticker receiver dropped, stopping stream task");
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => error!("Failed to connect ticker stream: {}", e),
                }

                warn!("Ticker stream reconnecting in {}s", retry_delay.as_secs());
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RECONNECT_DELAY);
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn request(side: Side, order_type: OrderType) -> OrderRequest {
        OrderRequest {
            symbol: "SOLUSD".to_string(),
            base_currency: "SOL".to_string(),
            quote_currency: "USD".to_string(),
            side,
            order_type,
            amount: dec("0.480"),
            price: dec("103.10"),
        }
    }

    fn param<'a>(params: &'a [(&str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_signature_matches_binance_reference() {
        // example from the Binance API documentation
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_limit_buy_is_ioc_with_price() {
        let params = order_params(&request(Side::Buy, OrderType::Limit));
        assert_eq!(param(&params, "side"), Some("BUY"));
        assert_eq!(param(&params, "type"), Some("LIMIT"));
        assert_eq!(param(&params, "timeInForce"), Some("IOC"));
        assert_eq!(param(&params, "price"), Some("103.1"));
        assert_eq!(param(&params, "quantity"), Some("0.48"));
    }

    #[test]
    fn test_market_sell_has_no_price() {
        let params = order_params(&request(Side::Sell, OrderType::Market));
        assert_eq!(param(&params, "type"), Some("MARKET"));
        assert_eq!(param(&params, "price"), None);
        assert_eq!(param(&params, "timeInForce"), None);
    }

    #[test]
    fn test_fill_price_is_average_of_executions() {
        let resp = BinanceOrderResponse {
            order_id: 7,
            symbol: "SOLUSD".to_string(),
            status: "FILLED".to_string(),
            executed_qty: dec("0.48"),
            cummulative_quote_qty: dec("49.44"),
        };
        let result = order_result(resp, &request(Side::Buy, OrderType::Limit));
        assert!(result.is_success());
        assert_eq!(result.order_id, "7");
        assert_eq!(result.filled_price, Some(dec("103")));
    }

    #[test]
    fn test_expired_ioc_is_an_error_result() {
        let resp = BinanceOrderResponse {
            order_id: 8,
            symbol: "SOLUSD".to_string(),
            status: "EXPIRED".to_string(),
            executed_qty: Decimal::ZERO,
            cummulative_quote_qty: Decimal::ZERO,
        };
        let result = order_result(resp, &request(Side::Buy, OrderType::Limit));
        assert!(!result.is_success());
        assert!(result.message.unwrap().contains("EXPIRED"));
    }

    #[test]
    fn test_rejection_reason_from_error_body() {
        let reason = rejection_reason(r#"{"code":-2010,"msg":"Account has insufficient balance"}"#);
        assert_eq!(reason, "Account has insufficient balance (code -2010)");
        assert_eq!(rejection_reason("<html>"), "<html>");
    }
}
