//! Peer-to-peer media negotiation
//!
//! One inbound avatar stream per conversation turn, negotiated by exchanging
//! an SDP offer for the backend's answer over POST /inferenceRT/handle_live.
//! The render layer observes stream state and remote track handles only; all
//! failures collapse to the absence of a live stream.

mod negotiator;
mod transport;

pub use negotiator::{MediaControl, MediaEvent, MediaNegotiator, StreamState};
pub use transport::{ApiOfferTransport, LiveOffer, OfferTransport, RemoteDescription};
