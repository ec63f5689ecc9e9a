use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle for emitting checkout events to the embedding front end.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving end of the channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self::new(sender), receiver)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur during checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Coupon events
    CouponApplied { code: String, discount: Decimal },
    CouponRemoved { code: String },
    CouponRejected { code: String, reason: String },

    // Payment gateway events
    GatewayReady,
    GatewayLoadFailed { reason: String },
    GatewayOrderCreated { order_id: Uuid, gateway_order_id: String },

    // Payment outcome events
    PaymentSucceeded { order_id: Uuid },
    PaymentFailed { order_id: Uuid, reason: String },
    PaymentCancelled { order_id: Uuid },

    // Session events
    SessionRefreshed,
    SessionExpired { reason: String },
}
