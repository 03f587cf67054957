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

use crate::{record::KeyRecord, signature, verifier::LookupTxt};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::{self, ErrorKind},
    time::Duration,
};
use tokio::time;
use tracing::trace;

/// An error that occurs when fetching public key records from DNS.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DnsError {
    /// The selector is not syntactically valid.
    InvalidSelector,
    /// No key record exists at the queried name.
    NotFound,
    /// Some key record is not a well-formed tag list, or is not UTF-8.
    InvalidFormat,
    /// The query did not complete in time.
    Timeout,
    /// The query failed for some other reason.
    Lookup(ErrorKind),
}

impl Display for DnsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSelector => write!(f, "invalid selector"),
            Self::NotFound => write!(f, "domain has no DKIM records in DNS"),
            Self::InvalidFormat => write!(f, "DKIM TXT record has invalid format"),
            Self::Timeout => write!(f, "DNS lookup timed out"),
            Self::Lookup(kind) => write!(f, "DNS lookup failed: {kind}"),
        }
    }
}

impl Error for DnsError {}

impl From<io::Error> for DnsError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound | ErrorKind::InvalidInput => Self::NotFound,
            ErrorKind::TimedOut => Self::Timeout,
            kind => Self::Lookup(kind),
        }
    }
}

/// Fetches the public key records published for a domain and selector.
///
/// The TXT records at `<selector>._domainkey.<domain>.` are looked up and each
/// is parsed as a key record. Records are returned in the order of the answer.
///
/// # Errors
///
/// Fails if the selector is invalid, if no record is found, if some record is
/// ill-formed, or if the lookup fails or exceeds `timeout`.
pub async fn fetch_public_keys<T>(
    resolver: &T,
    domain: &str,
    selector: &str,
    timeout: Duration,
) -> Result<Vec<KeyRecord>, DnsError>
where
    T: LookupTxt + ?Sized,
{
    fn parse_record(txt: io::Result<Vec<u8>>) -> Result<KeyRecord, DnsError> {
        let txt = txt.map_err(|_| DnsError::InvalidFormat)?;
        let txt = String::from_utf8(txt).map_err(|_| DnsError::InvalidFormat)?;
        txt.parse().map_err(|_| DnsError::InvalidFormat)
    }

    if !signature::validate_selector(selector) {
        return Err(DnsError::InvalidSelector);
    }

    // A domain given in absolute form loses its dot here and regains it below.
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let domain = idna::domain_to_ascii(domain).map_err(|_| DnsError::NotFound)?;

    // Note the trailing dot: only absolute queries.
    let dname = format!("{selector}._domainkey.{domain}.");

    trace!(%dname, "looking up public key records");

    let txts = match time::timeout(timeout, resolver.lookup_txt(&dname)).await {
        Ok(r) => r?,
        Err(_) => return Err(DnsError::Timeout),
    };

    let records = txts
        .into_iter()
        .map(parse_record)
        .collect::<Result<Vec<_>, _>>()?;

    if records.is_empty() {
        return Err(DnsError::NotFound);
    }

    trace!(%dname, count = records.len(), "found public key records");

    Ok(records)
}
