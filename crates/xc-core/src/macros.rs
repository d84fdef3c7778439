/// Declare a plain-data struct with the derives shared by every syntax and pool record.
#[macro_export]
macro_rules! common_struct {
    ($(#[$meta:meta])* $vis:vis struct $name:ident $($body:tt)*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis struct $name $($body)*
    };
}

/// Declare a plain-data enum with the derives shared by every syntax and pool record.
#[macro_export]
macro_rules! common_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident $($body:tt)*) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name $($body)*
    };
}

/// Macro to return early with an error
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($($arg)*)))
    };
}

/// Return early with a compiler-defect error. Never use this for user mistakes.
#[macro_export]
macro_rules! invariant {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Invariant(format!($($arg)*)))
    };
}

/// Check a compiler invariant, failing the unit with a fatal error when it does not hold.
#[macro_export]
macro_rules! ensure_invariant {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::invariant!($($arg)*);
        }
    };
}
