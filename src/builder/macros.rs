//! Macros for ergonomic machine construction.

/// Generate a state id enum together with its `StateId` implementation.
///
/// The generated enum derives everything `StateId` requires; the state name
/// is the variant name.
///
/// # Example
///
/// ```
/// use orthos::core::StateId;
/// use orthos::state_enum;
///
/// state_enum! {
///     pub enum Mission {
///         AcquireSensors,
///         Navigate,
///         Recovery,
///     }
/// }
///
/// assert_eq!(Mission::Navigate.name(), "Navigate");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::StateId for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}
