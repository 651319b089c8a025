//! Macro for implementing Display and FromStr for wire-named enums
//!
//! Enums that mirror string constants on the wire (event types, resource
//! kinds) share one mapping for both directions. Parsing is
//! case-insensitive; display always yields the canonical wire spelling.
//!
//! # Example
//!
//! ```rust
//! use nimbus_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Changes,
//!     Admin,
//! }
//!
//! impl_wire_name_conversions!(Channel {
//!     Changes => "changes",
//!     Admin => "admin_logs",
//! });
//!
//! assert_eq!(Channel::Admin.to_string(), "admin_logs");
//! assert_eq!("CHANGES".parse::<Channel>(), Ok(Channel::Changes));
//! ```

/// Implements Display, FromStr and `as_str` for unit-variant enums
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their wire names
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical wire name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(if s.eq_ignore_ascii_case($str) {
                    return Ok(Self::$variant);
                })+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
