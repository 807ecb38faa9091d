//! Text frame encoding and decoding.

use serde_json::Value;

use super::{Incoming, Outgoing, ServerMessage, TimeSample};

/// Encode a structured message as a JSON text frame
pub fn encode(msg: &Outgoing) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

/// Body of a clock-sync probe: the local send time as a bare integer
pub fn probe(now_millis: i64) -> String {
    now_millis.to_string()
}

/// Decode an inbound text frame.
///
/// `client_end` is the local time (ms) at which the frame was observed; it
/// completes the [`TimeSample`] when the frame is a probe reply. Frames that
/// cannot be classified become [`Incoming::Unknown`] so the store can report
/// them without the channel ever failing.
pub fn decode(text: &str, client_end: i64) -> Incoming {
    if text.starts_with('{') {
        return decode_structured(text);
    }

    match decode_time_reply(text, client_end) {
        Some(sample) => Incoming::ClientTime(sample),
        None => {
            tracing::warn!("Unparseable clock reply: {:?}", text);
            Incoming::Unknown(Value::String(text.to_string()))
        }
    }
}

fn decode_structured(text: &str) -> Incoming {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Malformed JSON frame: {}", e);
            return Incoming::Unknown(Value::String(text.to_string()));
        }
    };

    if value.get("type").is_none() {
        return Incoming::Unknown(value);
    }

    match serde_json::from_value::<ServerMessage>(value.clone()) {
        Ok(msg) => Incoming::Server(msg),
        Err(e) => {
            tracing::warn!("Unrecognized server message {}: {}", value["type"], e);
            Incoming::Unknown(value)
        }
    }
}

/// Probe replies are `"<echoed probe>\n<server time>"`
fn decode_time_reply(text: &str, client_end: i64) -> Option<TimeSample> {
    let mut lines = text.lines();
    let client_start = parse_millis(lines.next()?)?;
    let server = parse_millis(lines.next()?)?;
    Some(TimeSample {
        client_start,
        client_end,
        server,
    })
}

fn parse_millis(line: &str) -> Option<i64> {
    let line = line.trim();
    line.parse::<i64>().ok().or_else(|| {
        line.parse::<f64>()
            .ok()
            .filter(|ms| ms.is_finite())
            .map(|ms| ms.round() as i64)
    })
}
