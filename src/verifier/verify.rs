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

//! Validation of a single *DKIM-Signature* header.

use crate::{
    canonicalize::{canonicalize_body, canonicalize_header},
    crypto::{self, HashAlgorithm},
    header::Header,
    message::Message,
    parse::CRLF,
    record::KeyRecord,
    signature::{
        self, extract_dkim_tags, Canonicalization, CanonicalizationAlgorithm, DkimTag, DkimTags,
        SignatureAlgorithm,
    },
    util::CanonicalStr,
    verifier::{query, Config, LookupTxt, ValidationFailure, ValidationResult},
};
use subtle::ConstantTimeEq;
use tracing::{trace, warn};

const QUERY_METHOD_DNS_TXT: &str = "dns/txt";

/// Runs the validation checks on one signature header, stopping at the first
/// failure. Messages for passed checks are recorded in `result` as they go.
pub async fn check_signature<T>(
    resolver: &T,
    config: &Config,
    message: &Message,
    headers: &[Header],
    header: &Header,
    result: &mut ValidationResult,
) -> Result<(), ValidationFailure>
where
    T: LookupTxt + ?Sized,
{
    let tags = extract_dkim_tags(header).map_err(|_| ValidationFailure::NotDkimSignature)?;

    for tag in DkimTag::REQUIRED {
        if !tags.contains(&tag) {
            trace!("missing required tag {tag}");
            return Err(ValidationFailure::MissingRequiredTag(tag));
        }
        result.pass(format!("Required DKIM tag present: {tag}"));
    }

    let value = |tag| tags.get(&tag).unwrap_or_default();

    let domain = value(DkimTag::D);
    if !signature::validate_domain(domain) {
        return Err(ValidationFailure::InvalidDomain);
    }
    result.set_domain(domain);
    result.pass(format!("Signing domain is valid: {domain}"));

    let selector = value(DkimTag::S);
    if !signature::validate_selector(selector) {
        return Err(ValidationFailure::InvalidSelector);
    }
    result.set_selector(selector);
    result.pass(format!("Signing selector is valid: {selector}"));

    let version = value(DkimTag::V);
    if version != "1" {
        return Err(ValidationFailure::IncompatibleVersion(version.into()));
    }
    result.pass(format!("Compatible DKIM version: {version}"));

    let canon = canonicalization(&tags, result)?;
    trace!(domain, selector, %canon, "using canonicalization");
    result.pass(format!("Valid header canonicalization algorithm: {}", canon.header));
    result.pass(format!("Valid body canonicalization algorithm: {}", canon.body));

    let mut canonical_body = canonicalize_body(canon.body, message.body(), None);

    if let Some(l) = tags.get(&DkimTag::L) {
        let declared: usize = l
            .parse()
            .map_err(|_| ValidationFailure::InvalidBodyLength(l.into()))?;
        let actual = canonical_body.len();
        if declared > actual {
            return Err(ValidationFailure::BodyTooShort { declared, actual });
        }
        if declared > 0 {
            canonical_body.truncate(declared);
        }
        result.pass(format!("Optional body length tag is present and valid: {declared}"));
    }

    if let Some(i) = tags.get(&DkimTag::I) {
        if !i.ends_with(domain) {
            return Err(ValidationFailure::IdentityDomainMismatch(i.into()));
        }
        result.pass(format!("Agent or user identifier matches domain: {i}"));
    }

    let signed_headers = value(DkimTag::H);
    let signed_names = signed_header_names(signed_headers);
    if !signed_names.iter().any(|name| name.eq_ignore_ascii_case("From")) {
        return Err(ValidationFailure::FromHeaderNotSigned(signed_headers.into()));
    }
    result.pass("From header is included in signed header list.");

    if let Some(x) = tags.get(&DkimTag::X) {
        let expiry = parse_timestamp(DkimTag::X, x)?;
        if expiry < config.current_timestamp() {
            return Err(ValidationFailure::SignatureExpired);
        }
        result.pass("Signature has not expired.");

        let timestamp = match tags.get(&DkimTag::T) {
            Some(t) => parse_timestamp(DkimTag::T, t)?,
            None => 0,
        };
        if expiry < timestamp {
            return Err(ValidationFailure::ExpiryBeforeTimestamp);
        }
        result.pass("Expiry time is after signature time.");
    }

    let query_method = match tags.get(&DkimTag::Q).filter(|q| !q.is_empty()) {
        Some(q) => q,
        None => {
            warn!(domain, selector, "query method tag missing, using {QUERY_METHOD_DNS_TXT}");
            result.warn(format!("Query method tag missing, defaulting to {QUERY_METHOD_DNS_TXT}"));
            QUERY_METHOD_DNS_TXT
        }
    };
    if query_method != QUERY_METHOD_DNS_TXT {
        return Err(ValidationFailure::UnknownQueryMethod(query_method.into()));
    }

    let key_records = query::fetch_public_keys(resolver, domain, selector, config.lookup_timeout)
        .await
        .map_err(|e| {
            trace!(domain, selector, "could not fetch public keys: {e}");
            ValidationFailure::from_dns_error(e, domain, selector)
        })?;
    result.pass(format!("Found {} public key record(s) in DNS.", key_records.len()));

    let headers_to_canonicalize = select_headers(headers, &signed_names);

    let algorithm: SignatureAlgorithm = value(DkimTag::A)
        .parse()
        .map_err(|_| ValidationFailure::InvalidAlgorithm)?;

    let hash_alg = HashAlgorithm::from_name(&algorithm.hash_function)
        .ok_or_else(|| ValidationFailure::UnavailableHashAlgorithm(algorithm.hash_function.clone()))?;

    let canonical_headers = canonicalize_signed_headers(&headers_to_canonicalize, header, canon.header);

    trace!(
        domain,
        selector,
        headers = headers_to_canonicalize.len(),
        "canonicalized signed headers"
    );

    let body_hash = crypto::body_hash(hash_alg, &canonical_body);
    if !bool::from(body_hash.as_bytes().ct_eq(value(DkimTag::Bh).as_bytes())) {
        trace!(domain, selector, "body hash mismatch");
        return Err(ValidationFailure::BodyHashMismatch);
    }
    result.pass("Body hash matches signature.");

    // Every key returned is checked in turn; any failing check ends validation.
    for (key_index, key_record) in key_records.iter().enumerate() {
        trace!(domain, selector, key_index, "checking public key record");

        check_key_record(key_record, key_index, version, domain, &algorithm, result)?;

        if !HashAlgorithm::is_available(hash_alg.canonical_str()) {
            return Err(ValidationFailure::UnavailableHashAlgorithm(hash_alg.canonical_str().into()));
        }

        let public_key = match key_record.public_key() {
            None => {
                return Err(ValidationFailure::MissingPublicKey {
                    domain: domain.into(),
                    key_index,
                })
            }
            Some("") => {
                return Err(ValidationFailure::KeyRevoked {
                    domain: domain.into(),
                    key_index,
                })
            }
            Some(p) => p,
        };

        let verified = crypto::validate_signature(
            public_key,
            value(DkimTag::B),
            &canonical_headers,
            hash_alg.canonical_str(),
        )
        .map_err(ValidationFailure::Crypto)?;

        if !verified {
            return Err(ValidationFailure::SignatureNotVerified {
                domain: domain.into(),
                selector: selector.into(),
                key_index,
            });
        }
        result.pass("DKIM signature verified successfully!");
    }

    Ok(())
}

fn canonicalization(
    tags: &DkimTags,
    result: &mut ValidationResult,
) -> Result<Canonicalization, ValidationFailure> {
    let Some(c) = tags.get(&DkimTag::C).filter(|c| !c.is_empty()) else {
        warn!("canonicalization tag missing, using simple/simple");
        result.warn("Canonicalization tag missing, defaulting to simple/simple");
        return Ok(Default::default());
    };

    let (header, body) = match c.split_once('/') {
        Some((header, body)) => (header, Some(body)),
        None => (c, None),
    };

    let header_alg = header
        .parse::<CanonicalizationAlgorithm>()
        .map_err(|_| ValidationFailure::UnknownHeaderCanonicalization(header.into()))?;

    let body_alg = match body {
        Some(body) => body
            .parse::<CanonicalizationAlgorithm>()
            .map_err(|_| ValidationFailure::UnknownBodyCanonicalization(body.into()))?,
        None => {
            warn!("body canonicalization missing, using simple");
            result.warn("Body canonicalization algorithm missing, defaulting to simple");
            CanonicalizationAlgorithm::Simple
        }
    };

    Ok(Canonicalization {
        header: header_alg,
        body: body_alg,
    })
}

fn parse_timestamp(tag: DkimTag, value: &str) -> Result<u64, ValidationFailure> {
    value.parse().map_err(|_| ValidationFailure::InvalidTimestamp {
        tag,
        value: value.into(),
    })
}

// Names in the h= tag, in order, with exact repeats removed. Names differing
// only in case are kept, so `From:from` selects the From headers twice.
fn signed_header_names(value: &str) -> Vec<&str> {
    let mut names: Vec<&str> = vec![];
    for name in value.split(':').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

// For each name, all headers with that name, in message order.
fn select_headers<'a>(headers: &'a [Header], names: &[&str]) -> Vec<&'a Header> {
    names
        .iter()
        .flat_map(|name| headers.iter().filter(move |h| h.label().eq_ignore_ascii_case(name)))
        .collect()
}

// The signature header under test comes last, with its b= value removed and
// without its final line break.
fn canonicalize_signed_headers(
    headers: &[&Header],
    signature: &Header,
    algorithm: CanonicalizationAlgorithm,
) -> Vec<u8> {
    let mut result = vec![];

    for header in headers {
        result.extend(canonicalize_header(header, algorithm, false).as_ref());
    }

    let signature = canonicalize_header(signature, algorithm, true);
    result.extend(signature.strip_suffix(CRLF).unwrap_or(&signature));

    result
}

fn check_key_record(
    key_record: &KeyRecord,
    key_index: usize,
    version: &str,
    domain: &str,
    algorithm: &SignatureAlgorithm,
    result: &mut ValidationResult,
) -> Result<(), ValidationFailure> {
    let domain = Box::<str>::from(domain);

    if key_record.version().is_some_and(|v| v != format!("DKIM{version}")) {
        return Err(ValidationFailure::KeyVersionMismatch { domain, key_index });
    }
    result.pass("Public key version matches signature.");

    let hash = &*algorithm.hash_function;
    if key_record.hash_algorithms().is_some_and(|hs| !hs.contains(&hash)) {
        return Err(ValidationFailure::KeyHashAlgorithmMismatch { domain, key_index });
    }
    result.pass(format!("Public key hash algorithm ({hash}) matches signature."));

    let key_type = &*algorithm.key_type;
    if key_record.key_type().is_some_and(|k| k != key_type) {
        return Err(ValidationFailure::KeyTypeMismatch { domain, key_index });
    }
    result.pass(format!("Public key type ({key_type}) matches signature."));

    if let Some(services) = key_record.service_types() {
        if !services.iter().any(|s| *s == "*" || *s == "email") {
            return Err(ValidationFailure::KeyServiceType {
                domain,
                key_index,
                service: services.join(":").into(),
            });
        }
    }
    result.pass("Public key service type permits email usage.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    #[test]
    fn signed_header_names_deduplicated() {
        assert_eq!(
            signed_header_names("From:To: subject:From::To:Date"),
            ["From", "To", "subject", "Date"]
        );
        assert_eq!(signed_header_names("From:from"), ["From", "from"]);
    }

    #[test]
    fn select_headers_case_variants_repeat() {
        let message = Message::new("From: a\r\nTo: b\r\n\r\n").unwrap();
        let headers = message.headers().unwrap();

        let selected = select_headers(headers, &signed_header_names("From:from"));

        let values: Vec<_> = selected.iter().map(|h| h.raw_value()).collect();
        assert_eq!(values, [&b"a"[..], &b"a"[..]]);
    }

    #[test]
    fn select_headers_all_instances() {
        let message = Message::new("Received: 1\r\nFrom: a\r\nReceived: 2\r\nTo: b\r\n\r\n").unwrap();
        let headers = message.headers().unwrap();

        let selected = select_headers(headers, &["received", "From", "Cc"]);

        let values: Vec<_> = selected.iter().map(|h| h.raw_value()).collect();
        assert_eq!(values, [&b"1"[..], &b"2"[..], &b"a"[..]]);
    }

    #[test]
    fn canonicalize_signed_headers_strips_signature() {
        let message = Message::new(
            "From: Me <me@example.com>\r\n\
            DKIM-Signature: v=1; a=rsa-sha256; d=example.com;\r\n\tb=abc\r\n\tdef; bh=xyz\r\n\r\n",
        )
        .unwrap();
        let headers = message.headers().unwrap();

        let text = canonicalize_signed_headers(&[&headers[0]], &headers[1], CanonicalizationAlgorithm::Relaxed);

        assert_eq!(
            BStr::new(&text),
            BStr::new(
                "from:Me <me@example.com>\r\n\
                dkim-signature:v=1; a=rsa-sha256; d=example.com; b=; bh=xyz"
            )
        );

        let text = canonicalize_signed_headers(&[], &headers[1], CanonicalizationAlgorithm::Simple);

        assert_eq!(
            BStr::new(&text),
            BStr::new("DKIM-Signature: v=1; a=rsa-sha256; d=example.com;\r\n\tb=; bh=xyz")
        );
    }

    #[test]
    fn canonicalize_signed_headers_keeps_other_signatures() {
        let message = Message::new(
            "From: a\r\n\
            DKIM-Signature: v=1; b=x\r\n\
            DKIM-Signature: v=1; b=y\r\n\r\n",
        )
        .unwrap();
        let headers = message.headers().unwrap();

        let selected = select_headers(headers, &["From", "DKIM-Signature"]);
        let text = canonicalize_signed_headers(&selected, &headers[2], CanonicalizationAlgorithm::Relaxed);

        assert_eq!(
            BStr::new(&text),
            BStr::new(
                "from:a\r\n\
                dkim-signature:v=1; b=x\r\n\
                dkim-signature:v=1; b=y\r\n\
                dkim-signature:v=1; b="
            )
        );
    }

    #[test]
    fn canonicalization_defaults() {
        let header: Header = "DKIM-Signature: c=relaxed\r\n".parse().unwrap();
        let tags = extract_dkim_tags(&header).unwrap();
        let mut result = ValidationResult::new(0);

        assert_eq!(
            canonicalization(&tags, &mut result),
            Ok(Canonicalization {
                header: CanonicalizationAlgorithm::Relaxed,
                body: CanonicalizationAlgorithm::Simple,
            })
        );
        assert_eq!(result.warnings().len(), 1);

        let header: Header = "DKIM-Signature: c=relaxed/Simple\r\n".parse().unwrap();
        let tags = extract_dkim_tags(&header).unwrap();

        assert_eq!(
            canonicalization(&tags, &mut result),
            Err(ValidationFailure::UnknownBodyCanonicalization("Simple".into()))
        );
    }
}
