// dkim-validator – validation of DKIM signatures in email messages
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Validator and supporting types.

mod failure;
mod lookup;
mod query;
mod result;
mod verify;

pub use self::{
    failure::ValidationFailure,
    lookup::LookupTxt,
    query::{fetch_public_keys, DnsError},
    result::{ValidationResult, ValidationResults},
};

use crate::{
    header::HeaderError,
    message::{Message, MessageError},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::{Duration, SystemTime},
};
use tracing::{debug, trace};

/// Configuration for a validator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The maximum duration of public key record lookups. When this duration is
    /// exceeded validation of the signature fails (temporary failure).
    pub lookup_timeout: Duration,

    /// The `SystemTime` value to use as the instant ‘now’ when checking
    /// signature expiration.
    pub fixed_system_time: Option<SystemTime>,
}

impl Config {
    pub(crate) fn current_timestamp(&self) -> u64 {
        self.fixed_system_time
            .unwrap_or_else(SystemTime::now)
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(10),
            fixed_system_time: None,
        }
    }
}

/// An error that prevents validation of a message from starting at all.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValidatorError {
    Message(MessageError),
    Header(HeaderError),
}

impl Display for ValidatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(error) => write!(f, "could not parse message: {error}"),
            Self::Header(error) => write!(f, "could not parse message header: {error}"),
        }
    }
}

impl Error for ValidatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Message(error) => Some(error),
            Self::Header(error) => Some(error),
        }
    }
}

impl From<MessageError> for ValidatorError {
    fn from(error: MessageError) -> Self {
        Self::Message(error)
    }
}

impl From<HeaderError> for ValidatorError {
    fn from(error: HeaderError) -> Self {
        Self::Header(error)
    }
}

/// A validator of DKIM signatures in an email message.
///
/// Every *DKIM-Signature* header of the message is validated on its own, in
/// the order of the headers. A message is valid if any one of its signatures
/// is valid.
///
/// # Examples
///
/// The following example shows how to validate a message’s signatures using
/// a [`LookupTxt`] implementation that answers every query with the same key
/// record.
///
/// ```
/// use dkim_validator::{Config, LookupTxt, Message, Validator};
/// use std::{future::Future, io, pin::Pin};
///
/// struct StaticLookup;
///
/// impl LookupTxt for StaticLookup {
///     type Answer = Vec<io::Result<Vec<u8>>>;
///     type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;
///
///     fn lookup_txt(&self, _domain: &str) -> Self::Query<'_> {
///         Box::pin(async { Ok(vec![Ok(b"v=DKIM1; k=rsa; p=".to_vec())]) })
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let message = Message::new(
///     "DKIM-Signature: v=1; a=rsa-sha256; d=example.com; s=sel; c=relaxed/relaxed;\r\n\
///     \th=From:Subject; bh=frcCV1k9oG9oKj3dpUqdJg1PxRT2RSN/XKdLCPjaYaY=; b=AAAA\r\n\
///     From: me@example.com\r\n\
///     Subject: hello\r\n\
///     \r\n",
/// )?;
///
/// let validator = Validator::new(StaticLookup, Config::default());
///
/// let results = validator.validate(&message).await?;
///
/// // the key record has an empty p= tag: the key has been revoked
/// assert!(!results.is_valid());
/// assert_eq!(results.results()[0].fails(), ["Public key has been revoked (example.com key #0)"]);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// # }).unwrap();
/// ```
pub struct Validator<T> {
    resolver: T,
    config: Config,
}

impl<T: LookupTxt> Validator<T> {
    pub fn new(resolver: T, config: Config) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validates all DKIM signatures in a message.
    ///
    /// A message without a *DKIM-Signature* header yields a single failing
    /// result. Problems with an individual signature never make this method
    /// fail; they are recorded in that signature’s result.
    ///
    /// # Errors
    ///
    /// Fails if the message header cannot be parsed.
    pub async fn validate(&self, message: &Message) -> Result<ValidationResults, ValidatorError> {
        let headers = message.headers()?;
        let signatures = message.dkim_signatures()?;

        if signatures.is_empty() {
            trace!("no DKIM-Signature headers found");
            return Ok(ValidationResults::new(vec![ValidationResult::no_signature()]));
        }

        let mut results = Vec::with_capacity(signatures.len());

        for (index, header) in signatures {
            trace!(index, "processing DKIM-Signature");

            let mut result = ValidationResult::new(index);

            let outcome = verify::check_signature(
                &self.resolver,
                &self.config,
                message,
                headers,
                header,
                &mut result,
            )
            .await;

            match outcome {
                Ok(()) => {
                    debug!(index, domain = result.domain(), "DKIM signature valid");
                }
                Err(failure) => {
                    debug!(index, domain = result.domain(), "DKIM signature not valid: {failure}");
                    result.fail(failure);
                }
            }

            results.push(result);
        }

        Ok(ValidationResults::new(results))
    }

    /// Parses a raw message and validates all DKIM signatures in it.
    ///
    /// # Errors
    ///
    /// Fails if the message cannot be parsed.
    pub async fn validate_bytes(
        &self,
        raw: impl AsRef<[u8]>,
    ) -> Result<ValidationResults, ValidatorError> {
        let message = Message::new(raw)?;
        self.validate(&message).await
    }

    /// Whether a raw message carries at least one valid DKIM signature. All
    /// errors, including parse errors, are reported as `false`.
    pub async fn validate_boolean(&self, raw: impl AsRef<[u8]>) -> bool {
        match self.validate_bytes(raw).await {
            Ok(results) => results.is_valid(),
            Err(e) => {
                debug!("message could not be validated: {e}");
                false
            }
        }
    }
}
