//! Per-device request execution and response splicing.
//!
//! One device's requests run sequentially; they share a client and the
//! transport serializes framing anyway. Every failure mode here decays to
//! NULL samples; the scan loop never sees an error from this module.

use tracing::{error, warn};

use fieldscan_codec::{apply, decode, Value};

use crate::link::{Link, RawResponse, Transport};
use crate::planner::{DevicePlan, ReadRequest};
use crate::pool::{ClientPool, LinkState};

/// Poll one device per its plan, yielding exactly `plan.point_count`
/// samples in plan order.
pub(crate) async fn poll_device<T: Transport>(
    pool: &ClientPool<T>,
    plan: &DevicePlan,
) -> Vec<Value> {
    let mut samples = Vec::with_capacity(plan.point_count);

    let Some(slot) = pool.slot(&plan.connection.src) else {
        // The pool is built from the same fleet as the plans.
        error!(device = %plan.device, endpoint = %plan.connection.src, "endpoint has no client slot");
        samples.resize(plan.point_count, Value::Null);
        return samples;
    };

    for request in &plan.requests {
        let mut guard = slot.lock().await;
        let outcome = match guard.ensure(pool.transport()).await {
            Ok(link) => {
                link.read(request.function, request.address, request.count, request.slave)
                    .await
            }
            Err(error) => Err(error),
        };
        if outcome.is_err() && guard.state() == LinkState::Connected {
            guard.fault();
        }
        drop(guard);

        match outcome {
            Ok(raw) => splice(plan, request, raw, &mut samples),
            Err(error) => {
                warn!(device = %plan.device, %request, %error, "read failed, points nulled");
                samples.extend(request.windows.iter().map(|_| Value::Null));
            }
        }
    }

    samples
}

/// Cut the response into per-point windows, decode and adjust each.
fn splice(plan: &DevicePlan, request: &ReadRequest, raw: RawResponse, out: &mut Vec<Value>) {
    let count = usize::from(request.count);
    let mut words: Vec<Option<u16>> = match raw {
        RawResponse::Bits(bits) => bits
            .into_iter()
            .take(count)
            .map(|bit| Some(u16::from(bit)))
            .collect(),
        RawResponse::Words(words) => words.into_iter().take(count).map(Some).collect(),
    };
    if words.len() < count {
        warn!(
            device = %plan.device, %request, got = words.len(),
            "short response, trailing points nulled"
        );
        words.resize(count, None);
    }

    for window in &request.windows {
        let raw_window = &words[window.offset..window.offset + window.len];
        let sample = match decode(window.spec.format, raw_window) {
            Ok(value) => apply(&window.spec.adjustments, value),
            Err(error) => {
                error!(device = %plan.device, point = %window.spec.name, %error, "decode failed");
                Value::Null
            }
        };
        out.push(sample);
    }
}
