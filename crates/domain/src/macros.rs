//! Macro for implementing Display and FromStr for state enums
//!
//! Scheduler and uploader states are logged by name. This macro keeps the
//! string form of every state in one place.
//!
//! # Example
//!
//! ```rust
//! use beacon_domain::impl_state_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LaneState {
//!     Idle,
//!     Busy,
//! }
//!
//! impl_state_conversions!(LaneState {
//!     Idle => "idle",
//!     Busy => "busy",
//! });
//!
//! assert_eq!(LaneState::Busy.to_string(), "busy");
//! assert_eq!("IDLE".parse::<LaneState>(), Ok(LaneState::Idle));
//! ```

/// Implements Display and FromStr traits for state enums
///
/// - Display writes the lowercase string given for the variant
/// - FromStr parses case-insensitively and reports the enum name on failure
#[macro_export]
macro_rules! impl_state_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl ::core::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::core::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => ::core::result::Result::Ok(Self::$variant),)+
                    _ => ::core::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        ::core::stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    // A one-parameter alias in scope must not leak into the expansion.
    #[allow(dead_code)]
    type Result<T> = std::result::Result<T, crate::BeaconError>;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum LaneState {
        Idle,
        Draining,
        Halted,
    }

    impl_state_conversions!(LaneState {
        Idle => "idle",
        Draining => "draining",
        Halted => "halted",
    });

    #[test]
    fn display_uses_lowercase_names() {
        assert_eq!(LaneState::Idle.to_string(), "idle");
        assert_eq!(LaneState::Draining.to_string(), "draining");
        assert_eq!(LaneState::Halted.to_string(), "halted");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(LaneState::from_str("DRAINING").unwrap(), LaneState::Draining);
        assert_eq!(LaneState::from_str("Halted").unwrap(), LaneState::Halted);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let result = LaneState::from_str("paused");
        assert!(result.unwrap_err().contains("Invalid LaneState: paused"));
        assert!(LaneState::from_str("").is_err());
    }
}
