pub mod dispatch;
pub mod orders;
pub mod pricing;
pub mod tenants;

pub use dispatch::TaskDispatcher;
pub use orders::{CreateOrderRequest, OrderService, PaymentEvent};
pub use pricing::{PricedOrder, RequestedItem, FLAT_SHIPPING_COST, TAX_RATE};
pub use tenants::{CreateTenantRequest, TenantService};
