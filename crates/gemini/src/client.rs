use std::fmt;
use std::sync::Arc;

use bot_core::config::{AppSettings, Credentials, ExchangeConfig};
use bot_core::types::{AccountCurrencyInfo, AccountInfo, TradingPair};
use reqwest::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::envelope::{NonceGenerator, Params, RequestEnvelope};
use crate::error::{GeminiError, Result};
use crate::models::{
    ApiErrorResponse, Auction, AuctionHistory, AuctionHistoryQuery, Balance, CancelAllResult,
    HeartbeatResponse, NewOrderRequest, Order, Orderbook, OrderbookQuery, RawTicker, Ticker,
    Trade, TradeHistory, TradesQuery,
};
use crate::params;
use crate::signer::Signer;
use crate::transport::{
    HttpTransport, ProxyOptions, ReqwestTransport, TransportRequest, TransportResponse,
};

pub const GEMINI_API_URL: &str = "https://api.gemini.com";
pub const GEMINI_API_VERSION: &str = "1";

const SYMBOLS: &str = "symbols";
const TICKER: &str = "pubticker";
const AUCTION: &str = "auction";
const AUCTION_HISTORY: &str = "history";
const ORDERBOOK: &str = "book";
const TRADES: &str = "trades";
const ORDERS: &str = "orders";
const ORDER_NEW: &str = "order/new";
const ORDER_CANCEL: &str = "order/cancel";
const ORDER_CANCEL_SESSION: &str = "order/cancel/session";
const ORDER_CANCEL_ALL: &str = "order/cancel/all";
const ORDER_STATUS: &str = "order/status";
const MY_TRADES: &str = "mytrades";
const BALANCES: &str = "balances";
const HEARTBEAT: &str = "heartbeat";

#[derive(Clone)]
pub struct GeminiRestClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    name: String,
    signer: Option<Signer>,
    nonce: Arc<NonceGenerator>,
    authenticated_api_support: bool,
    verbose: bool,
}

impl fmt::Debug for GeminiRestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiRestClient")
            .field("base_url", &self.base_url)
            .field("name", &self.name)
            .field("authenticated", &self.signer.is_some())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl GeminiRestClient {
    /// Unauthenticated client; add credentials with [`GeminiRestClient::with_credentials`].
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name: bot_core::config::DEFAULT_EXCHANGE_NAME.to_string(),
            signer: None,
            nonce: Arc::new(NonceGenerator::new()),
            authenticated_api_support: false,
            verbose: false,
        }
    }

    pub fn from_config(config: &ExchangeConfig, settings: &AppSettings) -> Result<Self> {
        let proxy = ProxyOptions {
            http: settings.http_proxy.clone(),
            https: settings.https_proxy.clone(),
        };
        let transport = ReqwestTransport::new(settings.request_timeout(), proxy)?;
        let base_url = settings.base_url.as_deref().unwrap_or(GEMINI_API_URL);
        Ok(Self::with_exchange_config(base_url, Arc::new(transport), config))
    }

    pub fn with_exchange_config(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        config: &ExchangeConfig,
    ) -> Self {
        let mut client = Self::new(base_url, transport).with_verbose(config.verbose);
        client.name = config.name.clone();
        if config.credentials.is_complete() {
            client.signer = Some(Signer::new(config.credentials.clone()));
        }
        client.authenticated_api_support = config.authenticated_api_support;
        client
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.signer = Some(Signer::new(credentials));
        self.authenticated_api_support = true;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self))]
    pub async fn get_symbols(&self) -> Result<Vec<String>> {
        self.get(SYMBOLS, &[]).await
    }

    #[instrument(skip(self, pair), fields(pair = %pair))]
    pub async fn get_ticker(&self, pair: &TradingPair) -> Result<Ticker> {
        let path = format!("{TICKER}/{}", pair.as_symbol().to_lowercase());
        let raw: RawTicker = self.get(&path, &[]).await?;
        raw.into_ticker(pair)
    }

    #[instrument(skip(self))]
    pub async fn get_auction(&self, symbol: &str) -> Result<Auction> {
        self.get(&format!("{AUCTION}/{symbol}"), &[]).await
    }

    #[instrument(skip(self))]
    pub async fn get_auction_history(
        &self,
        symbol: &str,
        query: &AuctionHistoryQuery,
    ) -> Result<Vec<AuctionHistory>> {
        let path = format!("{AUCTION}/{symbol}/{AUCTION_HISTORY}");
        self.get(&path, &query.to_pairs()).await
    }

    #[instrument(skip(self))]
    pub async fn get_orderbook(&self, symbol: &str, query: &OrderbookQuery) -> Result<Orderbook> {
        self.get(&format!("{ORDERBOOK}/{symbol}"), &query.to_pairs())
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_trades(&self, symbol: &str, query: &TradesQuery) -> Result<Vec<Trade>> {
        self.get(&format!("{TRADES}/{symbol}"), &query.to_pairs())
            .await
    }

    #[instrument(skip(self, order), fields(symbol = %order.symbol))]
    pub async fn new_order(&self, order: &NewOrderRequest) -> Result<Order> {
        if !order.amount.is_finite() || order.amount <= 0.0 {
            return Err(GeminiError::InvalidParam("amount".into()));
        }
        if !order.price.is_finite() || order.price <= 0.0 {
            return Err(GeminiError::InvalidParam("price".into()));
        }

        let mut request = params! {
            "symbol" => order.symbol.as_str(),
            "amount" => order.amount.to_string(),
            "price" => order.price.to_string(),
            "side" => order.side.as_str(),
            "type" => order.order_type.as_str(),
        };
        if let Some(ref client_order_id) = order.client_order_id {
            request.insert("client_order_id".into(), client_order_id.as_str().into());
        }

        self.send_authenticated(Method::POST, ORDER_NEW, Some(request))
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: i64) -> Result<Order> {
        let request = params! { "order_id" => order_id };
        self.send_authenticated(Method::POST, ORDER_CANCEL, Some(request))
            .await
    }

    /// Cancel every order, or only those placed by this API session.
    #[instrument(skip(self))]
    pub async fn cancel_orders(&self, session_only: bool) -> Result<CancelAllResult> {
        let path = if session_only {
            ORDER_CANCEL_SESSION
        } else {
            ORDER_CANCEL_ALL
        };
        self.send_authenticated(Method::POST, path, None).await
    }

    #[instrument(skip(self))]
    pub async fn get_order_status(&self, order_id: i64) -> Result<Order> {
        let request = params! { "order_id" => order_id };
        self.send_authenticated(Method::POST, ORDER_STATUS, Some(request))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_active_orders(&self) -> Result<Vec<Order>> {
        self.send_authenticated(Method::POST, ORDERS, None).await
    }

    #[instrument(skip(self))]
    pub async fn get_trade_history(
        &self,
        symbol: &str,
        since: Option<i64>,
    ) -> Result<Vec<TradeHistory>> {
        let mut request = params! { "symbol" => symbol };
        if let Some(timestamp) = since {
            request.insert("timestamp".into(), timestamp.into());
        }
        self.send_authenticated(Method::POST, MY_TRADES, Some(request))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_balances(&self) -> Result<Vec<Balance>> {
        self.send_authenticated(Method::POST, BALANCES, None).await
    }

    pub async fn get_account_info(&self) -> Result<AccountInfo> {
        let balances = self.get_balances().await?;
        Ok(AccountInfo {
            exchange: self.name.clone(),
            currencies: balances
                .into_iter()
                .map(|balance| AccountCurrencyInfo {
                    currency: balance.currency,
                    total: balance.amount,
                    available: balance.available,
                })
                .collect(),
        })
    }

    #[instrument(skip(self))]
    pub async fn post_heartbeat(&self) -> Result<bool> {
        let response: HeartbeatResponse =
            self.send_authenticated(Method::POST, HEARTBEAT, None).await?;
        Ok(response.is_ok())
    }

    /// Unauthenticated GET against `/v1/<path>` with URL-encoded query pairs.
    pub async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut url = self.endpoint_url(path);
        if !query.is_empty() {
            url = Url::parse_with_params(&url, query)
                .map_err(|err| GeminiError::Url(err.to_string()))?
                .to_string();
        }

        debug!("Gemini GET {}", url);
        let request = TransportRequest {
            method: Method::GET,
            url,
            headers: Default::default(),
        };
        let response = self.transport.execute(request).await?;
        self.decode_response(response)
    }

    /// Signed request. The payload travels in headers; the body is always empty.
    #[instrument(skip(self, params), fields(exchange = %self.name))]
    pub async fn send_authenticated<T>(
        &self,
        method: Method,
        path: &str,
        params: Option<Params>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let signer = self.signer()?;
        let request_path = format!("/v{GEMINI_API_VERSION}/{path}");
        let envelope = RequestEnvelope::build(request_path, self.nonce.next(), params)?;

        if self.verbose {
            info!(payload = %envelope.to_json()?, "Gemini request json");
        }

        let signed = signer.sign(&envelope)?;
        let mut headers = signed.headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let request = TransportRequest {
            method,
            url: self.endpoint_url(path),
            headers,
        };
        let response = self.transport.execute(request).await?;
        self.decode_response(response)
    }

    fn signer(&self) -> Result<&Signer> {
        if !self.authenticated_api_support {
            return Err(GeminiError::AuthenticationDisabled(self.name.clone()));
        }
        self.signer.as_ref().ok_or(GeminiError::MissingCredentials)
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/v{GEMINI_API_VERSION}/{path}", self.base_url)
    }

    fn decode_response<T>(&self, response: TransportResponse) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let TransportResponse { status, body } = response;
        if self.verbose {
            info!(status = %status, body = %body, "Gemini raw response");
        } else {
            debug!(status = %status, "Gemini response received");
        }

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api) if api.result == "error" => GeminiError::Api {
                    reason: api.reason,
                    message: api.message,
                },
                _ => GeminiError::HttpStatus { status, body },
            });
        }

        serde_json::from_str::<T>(body.trim())
            .map_err(|source| GeminiError::Decode { source, body })
    }
}
