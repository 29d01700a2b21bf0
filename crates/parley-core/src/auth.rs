//! Operator authorization.
//!
//! Exactly one Telegram user may talk to the relay. The check is a pure
//! comparison against the configured operator ID.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Telegram user ID of the single authorized operator. Always positive;
/// negative IDs belong to groups and channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorId(i64);

impl OperatorId {
    pub fn new(id: i64) -> Result<Self, ConfigError> {
        if id <= 0 {
            return Err(ConfigError::Invalid {
                key: "ALLOWED_USER_ID",
                reason: format!("{} is not a user id; Telegram user ids are positive", id),
            });
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl FromStr for OperatorId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().parse::<i64>().map_err(|_| ConfigError::Invalid {
            key: "ALLOWED_USER_ID",
            reason: format!("'{}' is not an integer", s.trim()),
        })?;
        Self::new(id)
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decides whether a sender may use the relay.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    operator: OperatorId,
}

impl AuthorizationGate {
    pub fn new(operator: OperatorId) -> Self {
        Self { operator }
    }

    pub fn operator(&self) -> OperatorId {
        self.operator
    }

    /// True iff `sender_id` is the operator's numeric ID.
    pub fn is_authorized(&self, sender_id: &str) -> bool {
        sender_id
            .trim()
            .parse::<i64>()
            .is_ok_and(|id| id == self.operator.get())
    }
}
