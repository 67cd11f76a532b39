pub mod gateway;
pub mod mock;
pub mod razorpay;
pub mod retry;

pub use gateway::{payment_signature, GatewayError, GatewayOrder, PaymentGateway};
pub use mock::MockGateway;
pub use razorpay::{RazorpayConfig, RazorpayGateway};
pub use retry::{retry_transient, RetryPolicy};
