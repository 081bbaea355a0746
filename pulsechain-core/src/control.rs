//! Request dispatch for the command link
//!
//! Maps each protocol [`Request`] onto one scheduler operation and wraps
//! the outcome in a [`Response`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use pulsechain_hal::PulseEngine;
use pulsechain_protocol::{FailureReason, Frame, FrameError, Payload, Request, Response};
use rand::Rng;

use crate::error::SchedulerError;
use crate::scheduler::SharedScheduler;
use crate::traits::Clock;

fn respond(result: Result<(), SchedulerError>) -> Response {
    match result {
        Ok(()) => Response::ok(),
        Err(e) => Response::Failure(e.into()),
    }
}

impl<M: RawMutex, E: PulseEngine, C: Clock> SharedScheduler<M, E, C> {
    /// Execute a request
    ///
    /// Queries of an empty slot succeed with no payload.
    pub fn handle<R: Rng + ?Sized>(&self, request: &Request, rng: &mut R) -> Response {
        match *request {
            Request::StageTiming {
                total_s,
                exposure_fraction,
                resolution_s,
            } => respond(self.stage_timing(total_s, exposure_fraction, resolution_s)),
            Request::StageSequence(policy) => respond(self.stage_sequence(policy, rng)),
            Request::Start => respond(self.start()),
            Request::Stop => respond(self.stop()),
            Request::QueryProgress => {
                Response::Success(Some(Payload::Progress(self.progress().report())))
            }
            Request::QueryStagedTiming => {
                Response::Success(self.staged_timing().map(|t| Payload::Timing(t.report())))
            }
            Request::QueryStagedSequence { offset } => {
                Response::Success(self.staged_page(offset).map(Payload::Sequence))
            }
            Request::QueryCommittedTiming => {
                Response::Success(self.committed_timing().map(|t| Payload::Timing(t.report())))
            }
            Request::QueryCommittedSequence { offset } => {
                Response::Success(self.committed_page(offset).map(Payload::Sequence))
            }
        }
    }

    /// Decode a request frame, execute it and encode the response frame
    ///
    /// A frame that does not hold a valid request is answered with
    /// [`FailureReason::Malformed`] rather than dropped.
    pub fn handle_frame<R: Rng + ?Sized>(
        &self,
        frame: &Frame,
        rng: &mut R,
    ) -> Result<(Option<Request>, Frame), FrameError> {
        match Request::from_frame(frame) {
            Ok(request) => {
                let response = self.handle(&request, rng);
                Ok((Some(request), response.to_frame()?))
            }
            Err(FrameError::Malformed | FrameError::UnexpectedType) => {
                Ok((None, Response::Failure(FailureReason::Malformed).to_frame()?))
            }
            Err(e) => Err(e),
        }
    }
}
