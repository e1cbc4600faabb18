//! Forward-compatible string enums.
//!
//! The API adds enum values over time. Every enumerated wire field is modelled with
//! [`string_enum!`](crate::string_enum), which generates the known variants plus an
//! `Unknown(String)` variant that carries unrecognised tokens verbatim, so a newer
//! server never breaks decoding and the exact token survives a round trip.

/// Macro to generate an open string enum.
///
/// ```
/// nimbus_core::string_enum! {
///     /// Color of a widget.
///     pub enum Color {
///         /// Red
///         Red => "red",
///         /// Blue
///         Blue => "blue",
///     }
/// }
///
/// assert_eq!(Color::from("red"), Color::Red);
/// assert_eq!(Color::from("green").as_str(), "green");
/// ```
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $token:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
            /// Value not known to this version of the SDK, kept verbatim.
            Unknown(::std::string::String),
        }

        impl $name {
            /// Returns the wire token.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $token,)+
                    Self::Unknown(raw) => raw.as_str(),
                }
            }

            /// Returns true unless this is an unrecognised token.
            #[must_use]
            pub const fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }

        impl ::std::convert::From<&str> for $name {
            fn from(token: &str) -> Self {
                match token {
                    $($token => Self::$variant,)+
                    other => Self::Unknown(other.to_string()),
                }
            }
        }

        impl ::std::convert::From<::std::string::String> for $name {
            fn from(token: ::std::string::String) -> Self {
                Self::from(token.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::std::convert::Infallible;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $crate::__serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::__serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> $crate::__serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: $crate::__serde::Deserializer<'de>,
            {
                let token = <::std::string::String as $crate::__serde::Deserialize>::deserialize(
                    deserializer,
                )?;
                Ok(Self::from(token))
            }
        }
    };
}
