mod stripe;

pub use stripe::{CheckoutSession, StripeAccount, StripeClient};
