// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A provenance store is ready. `info!`
pub struct StoreOpened<'a> {
    pub backend: &'a str,
    pub location: &'a str,
}

impl Display for StoreOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Opened {} provenance store at {}",
            self.backend, self.location
        )
    }
}

impl StructuredLog for StoreOpened<'_> {
    fn log(&self) {
        tracing::info!(backend = self.backend, location = self.location, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "store",
            span_name = name,
            backend = self.backend,
            location = self.location,
        )
    }
}
