//
// result.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

/// Logs the error side of a `Result` and converts it to an `Option`, for
/// call sites where an error should be reported but not propagated.
pub trait OrLog<T> {
    fn or_log_error(self, message: &str) -> Option<T>;
    fn or_log_warning(self, message: &str) -> Option<T>;
}

impl<T, E> OrLog<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_log_error(self, message: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                log::error!("{message}: {err}");
                None
            },
        }
    }

    fn or_log_warning(self, message: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("{message}: {err}");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_log_error() {
        let ok: Result<i32, String> = Ok(42);
        assert_eq!(ok.or_log_error("unexpected"), Some(42));

        let err: Result<i32, String> = Err(String::from("boom"));
        assert_eq!(err.or_log_error("expected"), None);
    }
}
