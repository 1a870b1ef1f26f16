//! # Domain Models
//!
//! Wire and storage representations of the two documents that move through
//! the pipeline: the [`Task`] and the [`FinalReport`].
//!
//! ## Wire Schema
//!
//! A single casing is used end to end, for bus payloads and stored documents
//! alike: lowerCamelCase field names (`taskId`, `assignedToAgentId`, ...),
//! enums rendered as their full upper-snake names (`TASK_STATUS_PENDING`),
//! timestamps as RFC 3339 UTC strings. Inbound payloads may also use the
//! snake_case field names and numeric enum values; outbound payloads never do.

/// Declares a closed wire enum that can still carry out-of-range numbers.
///
/// Parsing must not be the place where an unknown status is rejected: the
/// validator reports it together with every other field defect, so numeric
/// values outside the declared set deserialize into `Unrecognized(n)`.
/// Unknown *names* are a structural error and fail deserialization.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $number:literal => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
            /// Numeric value outside the declared set
            Unrecognized(i32),
        }

        impl $name {
            /// Every declared value, in declaration order
            pub const DECLARED: &'static [$name] = &[$($name::$variant),+];

            pub fn number(&self) -> i32 {
                match self {
                    $(Self::$variant => $number,)+
                    Self::Unrecognized(n) => *n,
                }
            }

            pub fn from_number(number: i32) -> Self {
                match number {
                    $($number => Self::$variant,)+
                    other => Self::Unrecognized(other),
                }
            }

            pub fn wire_name(&self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some($wire),)+
                    Self::Unrecognized(_) => None,
                }
            }

            pub fn from_wire_name(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn is_declared(&self) -> bool {
                !matches!(self, Self::Unrecognized(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::from_number(0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.wire_name() {
                    Some(name) => write!(f, "{name}"),
                    None => write!(f, "{}", self.number()),
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if let Some(value) = Self::from_wire_name(s) {
                    return Ok(value);
                }
                s.parse::<i32>()
                    .map(Self::from_number)
                    .map_err(|_| format!("Invalid {}: {s}", stringify!($name)))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.wire_name() {
                    Some(name) => serializer.serialize_str(name),
                    None => serializer.serialize_i32(self.number()),
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct WireVisitor;

                impl<'de> serde::de::Visitor<'de> for WireVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "a {} name or number", stringify!($name))
                    }

                    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<$name, E> {
                        $name::from_wire_name(value).ok_or_else(|| {
                            E::custom(format!("unknown {} name: {value}", stringify!($name)))
                        })
                    }

                    fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<$name, E> {
                        i32::try_from(value)
                            .map($name::from_number)
                            .map_err(|_| E::custom(format!("{} out of range: {value}", stringify!($name))))
                    }

                    fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<$name, E> {
                        i32::try_from(value)
                            .map($name::from_number)
                            .map_err(|_| E::custom(format!("{} out of range: {value}", stringify!($name))))
                    }
                }

                deserializer.deserialize_any(WireVisitor)
            }
        }
    };
}

pub(crate) use wire_enum;

pub mod final_report;
pub mod task;

pub use final_report::{FinalReport, FinalStatus};
pub use task::{Task, TaskPriority, TaskStatus};
