//! Turn fallible upstream calls into total ones.
//!
//! Every user-facing service method ends in the same shape: run the strict
//! call, and on any error log it (optionally) and hand back a fixed fallback.
//! `FailSafe` is that shape, written once.

use std::future::Future;

use crate::{audit::ErrorLogger, errors::Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct FailSafe<'a> {
    operation: &'static str,
    user_input: Option<&'a str>,
    logger: Option<&'a ErrorLogger>,
}

impl<'a> FailSafe<'a> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            user_input: None,
            logger: None,
        }
    }

    /// User input that triggered the call, recorded with any failure.
    pub fn input(mut self, user_input: &'a str) -> Self {
        self.user_input = Some(user_input);
        self
    }

    pub fn logged(mut self, logger: &'a ErrorLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Resolve an already-computed result.
    pub fn apply<T>(self, result: Result<T>, fallback: T) -> T {
        self.apply_with(result, |_| fallback)
    }

    pub fn apply_with<T>(self, result: Result<T>, fallback: impl FnOnce(&Error) -> T) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                if let Some(logger) = self.logger {
                    logger.log(&e, self.operation, self.user_input);
                }
                fallback(&e)
            }
        }
    }

    pub async fn run<T, F>(self, fut: F, fallback: T) -> T
    where
        F: Future<Output = Result<T>>,
    {
        self.apply(fut.await, fallback)
    }
}
