//! Total name lookup for wire enums
//!
//! Raw ordinals received from the wire may be outside the known set; the
//! lookup never fails and renders those as `UNKNOWN(<value>)`.

use std::fmt;

use crate::{ActionStatus, ActionType, DeviceStatus, ErrorCode};

/// Name of an enum ordinal, or the raw value when it is not a known member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumName {
    Known(&'static str),
    Unknown(i32),
}

impl EnumName {
    pub fn is_known(&self) -> bool {
        matches!(self, EnumName::Known(_))
    }
}

impl fmt::Display for EnumName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumName::Known(name) => f.write_str(name),
            EnumName::Unknown(value) => write!(f, "UNKNOWN({})", value),
        }
    }
}

/// Wire enums with a canonical string name
pub trait NamedEnum: TryFrom<i32> + Copy {
    fn str_name(self) -> &'static str;
}

impl NamedEnum for DeviceStatus {
    fn str_name(self) -> &'static str {
        self.as_str_name()
    }
}

impl NamedEnum for ActionType {
    fn str_name(self) -> &'static str {
        self.as_str_name()
    }
}

impl NamedEnum for ActionStatus {
    fn str_name(self) -> &'static str {
        self.as_str_name()
    }
}

impl NamedEnum for ErrorCode {
    fn str_name(self) -> &'static str {
        self.as_str_name()
    }
}

/// Look up the name of `value` as a member of `E`
pub fn name_of<E: NamedEnum>(value: i32) -> EnumName {
    match E::try_from(value) {
        Ok(member) => EnumName::Known(member.str_name()),
        Err(_) => EnumName::Unknown(value),
    }
}

pub fn device_status_name(value: i32) -> EnumName {
    name_of::<DeviceStatus>(value)
}

pub fn action_status_name(value: i32) -> EnumName {
    name_of::<ActionStatus>(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_device_status() {
        assert_eq!(device_status_name(4), EnumName::Known("STATUS_UPDATING"));
        assert_eq!(device_status_name(6).to_string(), "STATUS_ERROR");
    }

    #[test]
    fn test_unknown_value_is_reported_not_rejected() {
        let name = device_status_name(42);
        assert_eq!(name, EnumName::Unknown(42));
        assert!(!name.is_known());
        assert_eq!(name.to_string(), "UNKNOWN(42)");
        assert_eq!(action_status_name(-1).to_string(), "UNKNOWN(-1)");
    }

    #[test]
    fn test_status_ordinals_are_fixed() {
        let expected = [
            (0, "STATUS_IDLE"),
            (1, "STATUS_BUSY"),
            (2, "STATUS_OFFLINE"),
            (3, "STATUS_MAINTENANCE"),
            (4, "STATUS_UPDATING"),
            (5, "STATUS_RECOVERING"),
            (6, "STATUS_ERROR"),
        ];
        for (ordinal, name) in expected {
            assert_eq!(device_status_name(ordinal), EnumName::Known(name));
            assert_eq!(DeviceStatus::from_str_name(name).map(i32::from), Some(ordinal));
        }
    }

    #[test]
    fn test_other_enums() {
        assert_eq!(name_of::<ActionType>(0).to_string(), "SOFTWARE_UPDATE");
        assert_eq!(action_status_name(2).to_string(), "COMPLETED");
        assert_eq!(name_of::<ErrorCode>(1).to_string(), "NOT_FOUND");
    }
}
