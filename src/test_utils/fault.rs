//! Module that contains utility functions for fault injection in test code
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum When {
    Always,
    Never,
}

/// What the faulty call returns
#[derive(Debug, Clone)]
pub enum Kind {
    /// the node can't be reached
    Unavailable,
    /// the node answers with the given error status
    Status(u16),
}

/// A fault is an error that is returned based on the [`When`]
#[derive(Clone, Debug)]
pub struct Fault {
    pub when: When,
    pub kind: Kind,
}

impl Default for Fault {
    fn default() -> Self {
        Self {
            when: When::Never,
            kind: Kind::Unavailable,
        }
    }
}

impl Fault {
    pub fn always(kind: Kind) -> Self {
        Self {
            when: When::Always,
            kind,
        }
    }

    /// Returns the configured error if the fault fires
    pub fn check(&self, addr: &str) -> Result<()> {
        match self.when {
            When::Never => Ok(()),
            When::Always => match self.kind {
                Kind::Unavailable => Err(Error::NodeUnavailable {
                    addr: addr.to_string(),
                    reason: "Mocked connection refused".to_string(),
                }),
                Kind::Status(status) => Err(Error::Remote {
                    status,
                    kind: None,
                    reason: "Mocked error status".to_string(),
                }),
            },
        }
    }
}
