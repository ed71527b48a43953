//! WhatsApp JID (Jabber ID) addressing.
//!
//! Recipients arrive over HTTP either as full JIDs or as bare phone numbers.
//! Both forms are normalized here before they reach the protocol client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Known JID servers on WhatsApp
pub mod servers {
    pub const DEFAULT_USER: &str = "s.whatsapp.net";
    pub const GROUP: &str = "g.us";
    pub const LEGACY_USER: &str = "c.us";
}

/// Jid identifies a user, group or device on WhatsApp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    pub user: String,
    pub device: u16,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse JID: {0}")]
pub struct ParseJidError(pub String);

impl Jid {
    /// Creates a new regular JID.
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
            ..Default::default()
        }
    }

    /// Creates a user JID on the default server.
    pub fn user(user: impl Into<String>) -> Self {
        Self::new(user, servers::DEFAULT_USER)
    }

    pub fn is_group(&self) -> bool {
        self.server == servers::GROUP
    }

    /// Returns a version of the JID without the device part.
    pub fn to_non_ad(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }

    fn from_phone_number(raw: &str) -> Result<Self, ParseJidError> {
        let digits: String = raw
            .trim_start_matches('+')
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseJidError(format!("`{raw}` is not a phone number or JID")));
        }

        Ok(Self::user(digits))
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else if !self.user.is_empty() {
            write!(f, "{}@{}", self.user, self.server)
        } else {
            write!(f, "{}", self.server)
        }
    }
}

impl FromStr for Jid {
    type Err = ParseJidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((user_part, server)) = s.split_once('@') else {
            return Self::from_phone_number(s);
        };

        if server.is_empty() || server.contains('@') {
            return Err(ParseJidError(format!("invalid server in `{s}`")));
        }

        let mut jid = Jid::new(user_part, server);

        if let Some((user, device)) = user_part.split_once(':') {
            jid.user = user.to_string();
            jid.device = device
                .parse()
                .map_err(|_| ParseJidError("failed to parse device from JID".to_string()))?;
        }

        if jid.server == servers::LEGACY_USER {
            jid.server = servers::DEFAULT_USER.to_string();
        }

        Ok(jid)
    }
}

impl TryFrom<String> for Jid {
    type Error = ParseJidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_jid() {
        let jid: Jid = "1234567890@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user, "1234567890");
        assert_eq!(jid.server, servers::DEFAULT_USER);
        assert_eq!(jid.device, 0);
    }

    #[test]
    fn test_parse_device_jid() {
        let jid: Jid = "1234567890:2@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user, "1234567890");
        assert_eq!(jid.device, 2);
        assert_eq!(jid.to_string(), "1234567890:2@s.whatsapp.net");
        assert_eq!(jid.to_non_ad().to_string(), "1234567890@s.whatsapp.net");
    }

    #[test]
    fn test_bare_number_is_normalized() {
        let jid: Jid = "+62 812-3456".parse().unwrap();
        assert_eq!(jid.to_string(), "628123456@s.whatsapp.net");

        let jid: Jid = "123".parse().unwrap();
        assert_eq!(jid, Jid::user("123"));
    }

    #[test]
    fn test_legacy_server_is_rewritten() {
        let jid: Jid = "555@c.us".parse().unwrap();
        assert_eq!(jid.server, servers::DEFAULT_USER);
    }

    #[test]
    fn test_group_jid() {
        let jid: Jid = "123456789-1234567890@g.us".parse().unwrap();
        assert_eq!(jid.user, "123456789-1234567890");
        assert!(jid.is_group());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("hello".parse::<Jid>().is_err());
        assert!("".parse::<Jid>().is_err());
        assert!("1@".parse::<Jid>().is_err());
        assert!("1:x@s.whatsapp.net".parse::<Jid>().is_err());
    }
}
