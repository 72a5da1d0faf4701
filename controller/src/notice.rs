//! Dashboard notifications.
//!
//! Each variant serializes to one JSON object with a `type` tag, carrying only
//! the indices a viewer needs to update its board.

use crate::registry::Size;
use concourse_core::CloudEvent;
use serde::Serialize;

/// One message for the dashboard viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notice<'a> {
    /// A customer joined retailer `r`
    Customer { r: usize },
    /// Retailer at `r` was removed
    #[serde(rename = "rmretailer")]
    RemoveRetailer { r: usize },
    /// Supplier at `s` was removed
    #[serde(rename = "rmsupplier")]
    RemoveSupplier { s: usize },
    /// Carrier at `c` was removed
    #[serde(rename = "rmcarrier")]
    RemoveCarrier { c: usize },
    /// A retailer was appended
    Retailer { logo: &'a str },
    /// A supplier was appended
    Supplier { logo: &'a str },
    /// A carrier was appended
    Carrier { logo: &'a str },
    /// Customer `c` of retailer `r` left the queue
    Satisfied { r: usize, c: usize },
    /// Customer `c` of retailer `r` asked to be highlighted
    Jump { r: usize, c: usize },
    /// Carrier `c` is moving goods from supplier `s` to retailer `r`
    #[serde(rename = "gocarrier")]
    GoCarrier { c: usize, s: usize, r: usize },
    /// Mirror of an inbound bus event
    Event { event: &'a CloudEvent },
    /// Small offer at retailer `r`; `c` is 0 when released, 1 when delivered
    Small { r: usize, c: u8 },
    /// Medium offer, same layout as `Small`
    Medium { r: usize, c: u8 },
    /// Large offer, same layout as `Small`
    Large { r: usize, c: u8 },
}

impl Notice<'_> {
    /// Offer notice for retailer `r`.
    #[must_use]
    pub fn offer(size: Size, r: usize, delivered: bool) -> Self {
        let c = u8::from(delivered);
        match size {
            Size::Small => Self::Small { r, c },
            Size::Medium => Self::Medium { r, c },
            Size::Large => Self::Large { r, c },
        }
    }

    /// Wire form.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Every field is a plain number, string or already-valid event.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_dashboard_protocol() {
        assert_eq!(
            Notice::RemoveSupplier { s: 1 }.to_json(),
            r#"{"type":"rmsupplier","s":1}"#
        );
        assert_eq!(
            Notice::GoCarrier { c: 0, s: 1, r: 2 }.to_json(),
            r#"{"type":"gocarrier","c":0,"s":1,"r":2}"#
        );
        assert_eq!(
            Notice::Retailer { logo: "n.png" }.to_json(),
            r#"{"type":"retailer","logo":"n.png"}"#
        );
    }

    #[test]
    fn offer_notices_are_keyed_by_size() {
        assert_eq!(
            Notice::offer(Size::Medium, 3, false).to_json(),
            r#"{"type":"medium","r":3,"c":0}"#
        );
        assert_eq!(
            Notice::offer(Size::Large, 0, true).to_json(),
            r#"{"type":"large","r":0,"c":1}"#
        );
    }

    #[test]
    fn event_mirror_embeds_the_envelope() {
        let event = CloudEvent::new("Connection", "Retailer.north").with_id("e1");
        let json: serde_json::Value =
            serde_json::from_str(&Notice::Event { event: &event }.to_json()).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["source"], "Retailer.north");
        assert_eq!(json["event"]["id"], "e1");
    }
}
