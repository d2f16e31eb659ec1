//! Invocation payload rendering
//!
//! Every field of the message is carried as a JSON string value under
//! `message`, alongside the stream and id it came from:
//!
//! ```json
//! {"stream":"orders","id":"1700000000000-0","message":{"action":"buy","user":"42"}}
//! ```
//!
//! A message with a value that is not valid UTF-8 cannot be rendered; it fails
//! like any other invocation and stays pending.

use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::invoke::error::InvokeError;
use crate::store::StreamMessage;

#[derive(Serialize)]
struct Envelope<'a> {
    stream: &'a str,
    id: String,
    message: BTreeMap<&'a str, &'a str>,
}

/// Render a message as the JSON body sent to the compute function
pub fn render(message: &StreamMessage) -> Result<Bytes, InvokeError> {
    let fields = message
        .fields
        .iter()
        .map(|(key, value)| {
            std::str::from_utf8(value)
                .map(|value| (key.as_str(), value))
                .map_err(|e| {
                    InvokeError::Serialization(format!(
                        "Field '{}' of {} is not valid UTF-8: {}",
                        key, message.id, e
                    ))
                })
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let envelope = Envelope {
        stream: &message.stream,
        id: message.id.to_string(),
        message: fields,
    };
    Ok(Bytes::from(serde_json::to_vec(&envelope)?))
}
