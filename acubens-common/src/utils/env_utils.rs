use std::env;

use crate::prelude::*;

pub struct EnvUtils;

impl EnvUtils {
    pub fn i64_var(key: &str, default: i64) -> i64 {
        match env::var(key) {
            Ok(v) => v.parse().unwrap_or_else(|_| {
                warn!("ignoring unparseable {}={}", key, v);
                default
            }),
            Err(_) => default,
        }
    }

    pub fn str_var(key: &str, default: &str) -> InlineStr {
        match env::var(key) {
            Ok(v) => v.into(),
            Err(_) => default.into(),
        }
    }
}
