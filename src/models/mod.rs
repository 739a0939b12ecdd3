pub mod ids;
pub mod market;
pub mod order;
pub mod price;

pub use ids::{MarketId, OrderId, Symbol, UserId};
pub use market::{CreateMarketRequest, Market, MarketKind, MarketStatus};
pub use order::{Order, OrderDirection, OrderKind, OrderStatus, Side};
pub use price::{InvalidPriceError, Price};
