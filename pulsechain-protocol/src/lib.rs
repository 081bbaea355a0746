//! Pulsechain Command Link Protocol
//!
//! This crate defines the byte protocol between a remote operator and the
//! scheduler. A remote side stages a timing and a sequence, starts and
//! stops playback and queries progress; the scheduler answers every request
//! with exactly one response.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌───────┬────────┬──────┬─────────────┬──────────┐
//! │ START │ LENGTH │ TYPE │ PAYLOAD     │ CHECKSUM │
//! │ 1B    │ 1B     │ 1B   │ 0–250B      │ 1B       │
//! └───────┴────────┴──────┴─────────────┴──────────┘
//! ```
//!
//! Payloads are [`postcard`]-encoded [`Request`] and [`Response`] values.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;
pub mod messages;

pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use messages::{
    FailureReason, Payload, ProgressReport, Request, Response, SecondsDomain, SequencePage,
    SequencePolicy, TickDomain, TimingReport, MAX_PAGE_BYTES, MAX_PAGE_TICKS, MSG_REQUEST, MSG_RESPONSE,
};
