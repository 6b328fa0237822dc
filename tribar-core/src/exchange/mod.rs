//! Exchange access: the gateway trait, the Bybit REST implementation and an
//! in-memory stand-in.

pub mod bybit;
pub mod circuit_breaker;
pub mod gateway;
pub mod memory;
pub mod signing;

pub use bybit::{BybitGateway, BybitSettings, DEFAULT_BASE_URL};
pub use circuit_breaker::CircuitBreaker;
pub use gateway::{
    ExchangeGateway, GatewayError, OpenOrder, OrderRequest, OrderType, PlacedOrder, PositionInfo,
    ProtectiveStop, Ticker, TimeInForce,
};
pub use memory::{GatewayCall, InMemoryGateway};
pub use signing::Credentials;
