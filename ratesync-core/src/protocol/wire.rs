//! JSON text encoding of the message contract.

use serde::Serialize;

use crate::error::Result;
use crate::protocol::messages::{BrokerRequest, BrokerResponse, ContextMessage};

/// Encode any contract message as JSON text.
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_request(raw: &str) -> Result<BrokerRequest> {
    Ok(serde_json::from_str(raw)?)
}

pub fn decode_response(raw: &str) -> Result<BrokerResponse> {
    Ok(serde_json::from_str(raw)?)
}

pub fn decode_context_message(raw: &str) -> Result<ContextMessage> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{Ack, SetSpeedResponse, StateSnapshot};
    use ratesync_model::PlaybackState;

    #[test]
    fn requests_use_action_tag() {
        let raw = encode(&BrokerRequest::SetSpeed { speed: 1.75 }).unwrap();
        assert_eq!(raw, r#"{"action":"setSpeed","speed":1.75}"#);

        let parsed = decode_request(r#"{"action":"getState"}"#).unwrap();
        assert_eq!(parsed, BrokerRequest::GetState);
    }

    #[test]
    fn set_state_carries_record_shape() {
        let parsed = decode_request(
            r#"{"action":"setState","state":{"currentSpeed":2,"lastSpeed":2}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            BrokerRequest::SetState {
                state: PlaybackState::new(2.0, 2.0)
            }
        );
    }

    #[test]
    fn responses_are_distinguished_by_shape() {
        let snapshot = encode(&BrokerResponse::Snapshot(StateSnapshot::default()))
            .unwrap();
        assert!(matches!(
            decode_response(&snapshot).unwrap(),
            BrokerResponse::Snapshot(_)
        ));

        let speed = encode(&BrokerResponse::SpeedSet(SetSpeedResponse {
            success: true,
            state: PlaybackState::new(2.0, 2.0),
        }))
        .unwrap();
        assert!(matches!(
            decode_response(&speed).unwrap(),
            BrokerResponse::SpeedSet(SetSpeedResponse { success: true, .. })
        ));

        let ack = encode(&BrokerResponse::Ack(Ack { success: true })).unwrap();
        assert_eq!(ack, r#"{"success":true}"#);
        assert_eq!(
            decode_response(&ack).unwrap(),
            BrokerResponse::Ack(Ack { success: true })
        );
    }

    #[test]
    fn context_messages_round_trip_through_text() {
        let message = ContextMessage::StateUpdated {
            state: PlaybackState::new(1.0, 1.75),
        };
        let raw = encode(&message).unwrap();
        assert!(raw.starts_with(r#"{"action":"stateUpdated""#));
        assert_eq!(decode_context_message(&raw).unwrap(), message);
    }

    #[test]
    fn unknown_action_is_an_error() {
        assert!(decode_context_message(r#"{"action":"reboot"}"#).is_err());
    }
}
