mod request_gate;

pub use request_gate::checkout_gate;
