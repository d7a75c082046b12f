//! Inline-button callback data: `<action>:<payload>`.

use crate::error::CoreError;
use crate::gig::{parse_gig_id, GigStatus};
use crate::types::DbId;

/// Platform limit on callback data length (bytes).
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// A decoded moderator button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Approve(DbId),
    Reject(DbId),
    /// Terminal marker left on a rejected moderation message.
    Rejected(DbId),
    /// Label-only status button on a submitter's feedback message.
    Status(String),
    Unknown { action: String, payload: String },
}

impl CallbackAction {
    /// Decode callback data.
    ///
    /// Unrecognised actions decode to [`CallbackAction::Unknown`]; a known
    /// gig action with an invalid id is a validation error.
    pub fn parse(data: &str) -> Result<Self, CoreError> {
        let (action, payload) = data.split_once(':').unwrap_or((data, ""));
        match action {
            "approve" => Ok(Self::Approve(parse_gig_id(payload)?)),
            "reject" => Ok(Self::Reject(parse_gig_id(payload)?)),
            "rejected" => Ok(Self::Rejected(parse_gig_id(payload)?)),
            "status" => Ok(Self::Status(payload.to_string())),
            _ => Ok(Self::Unknown {
                action: action.to_string(),
                payload: payload.to_string(),
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Approve(id) => format!("approve:{id}"),
            Self::Reject(id) => format!("reject:{id}"),
            Self::Rejected(id) => format!("rejected:{id}"),
            Self::Status(s) => format!("status:{s}"),
            Self::Unknown { action, payload } => format!("{action}:{payload}"),
        }
    }

    /// Status button data for a feedback message.
    pub fn status(status: GigStatus) -> Self {
        Self::Status(status.as_str().to_string())
    }
}
