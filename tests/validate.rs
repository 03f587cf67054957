pub mod common;

use common::{LookupOutput, MockLookup};
use dkim_validator::{
    CryptoError, HeaderError, Message, MessageError, ValidationFailure, ValidationResult,
    ValidatorError,
};
use std::{
    io::{self, ErrorKind},
    time::Duration,
};

const SIGNATURE: &str = "ljWj1co9L6sMrXJ1yBwJ771dnjvVKZN3i97Q/QB0lGQf43FPdautceMsiu3M132QopX63Osqp\r\n \
    T1Oz40T9EMONwzCpzIMKKB/tNjDe5qw+evPjf/5mAaiVpIevh1P377t/K0y0nRmCaPbfa0sbm\r\n \
    eoFMSapHqTbf2phVJOCo7ejp3laovXSOhQoLZQrnCCW8LnqibtSoAO24ryr+B045XyBIcGPQk\r\n \
    IWnRd043/Onv9ACRzau3F80gszR/86grpUwmZ88wHTL8R6g/pqz2eExQNNRmkFaVkwFG0vT5o\r\n \
    Rh7Z0ZEl+n4fqoyrTctR8ZEimwwd+xFOtx1hB9KgjW+JVcdTVQ==";

const TAGS: &str = "v=1; d=example.com; i=test@example.com; s=phpmailer;\r\n \
    a=rsa-sha256; q=dns/txt; l=6; t=1570645905; c=relaxed/simple;\r\n \
    h=Date:To:From:Subject:Message-ID:X-Mailer:Content-Type;\r\n \
    bh=g3zLYH4xKxcPrHOD18z9YfpQcnk/GaJedfustWU5uGs=;";

fn make_msg(tags: &str) -> String {
    format!(
        "Date: Wed, 9 Oct 2019 18:31:45 +0000\r\n\
        To: DKIM test <3yHp6B4Ge9vspC@dkimvalidator.com>\r\n\
        From: Email test <test@example.com>\r\n\
        Subject: DKIM sign\r\n\
        Message-ID: <4JyENfIuXMRgdMymktmFxe0oqnSzslfdvbHYR4E@Mac-Pro.local>\r\n\
        X-Mailer: PHPMailer 6.1.6 (https://github.com/PHPMailer/PHPMailer)\r\n\
        MIME-Version: 1.0\r\n\
        Content-Type: text/html; charset=iso-8859-1\r\n\
        DKIM-Signature: {tags}\r\n b={SIGNATURE}\r\n\
        \r\n\
        test"
    )
}

// The standard tags with one tag replaced, added, or removed.
fn tags_with(name: &str, value: Option<&str>) -> String {
    let mut found = false;
    let mut tags = vec![];

    for tag in TAGS.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let (n, _) = tag.split_once('=').unwrap();
        if n == name {
            found = true;
            if let Some(v) = value {
                tags.push(format!("{name}={v}"));
            }
        } else {
            tags.push(tag.to_owned());
        }
    }
    if !found {
        if let Some(v) = value {
            tags.push(format!("{name}={v}"));
        }
    }

    tags.join(";\r\n ") + ";"
}

async fn validate_with(resolver: MockLookup, msg: &str) -> ValidationResult {
    let _ = tracing_subscriber::fmt::try_init();

    let validator = common::validator(resolver);

    let results = validator.validate_bytes(msg).await.unwrap();

    assert_eq!(results.results().len(), 1);

    results.into_iter().next().unwrap()
}

fn not_found() -> MockLookup {
    MockLookup::new(|_| {
        let answer: io::Result<LookupOutput> = Err(ErrorKind::NotFound.into());
        Box::pin(async move { answer })
    })
}

fn assert_failure(result: &ValidationResult, message: &str) {
    assert!(!result.is_valid());
    assert_eq!(result.fails(), [message]);
}

#[tokio::test]
async fn no_signature() {
    let _ = tracing_subscriber::fmt::try_init();

    let validator = common::validator(not_found());

    let results = validator
        .validate_bytes("From: me@example.com\r\nSubject: hi\r\n\r\nhello\r\n")
        .await
        .unwrap();

    assert!(!results.is_valid());
    assert_eq!(results.results().len(), 1);
    assert_eq!(results.results()[0].fails(), ["Message does not contain a DKIM signature."]);
}

#[tokio::test]
async fn unparseable_input() {
    let _ = tracing_subscriber::fmt::try_init();

    let validator = common::validator(not_found());

    assert_eq!(
        validator.validate_bytes("").await,
        Err(ValidatorError::Message(MessageError::Empty))
    );
    assert_eq!(
        validator.validate_bytes(" From: me\r\n\r\nbody").await,
        Err(ValidatorError::Header(HeaderError::FoldedFirstLine))
    );

    assert!(!validator.validate_boolean("").await);
    assert!(!validator.validate_boolean("no header here").await);
}

#[tokio::test]
async fn missing_selector_tag() {
    let msg = make_msg(&tags_with("s", None));

    let result = validate_with(not_found(), &msg).await;

    assert_failure(&result, "DKIM signature missing required tag: s");
    assert_eq!(
        result.passes(),
        ["v", "a", "b", "bh", "d", "h"].map(|t| format!("Required DKIM tag present: {t}"))
    );
    assert_eq!(result.index(), Some(8));
}

#[tokio::test]
async fn invalid_domain_and_selector() {
    let result = validate_with(not_found(), &make_msg(&tags_with("d", Some(".example.com")))).await;

    assert_failure(&result, "Signing domain is invalid");
    assert_eq!(result.domain(), None);

    let result = validate_with(not_found(), &make_msg(&tags_with("s", Some(".phpmailer")))).await;

    assert_failure(&result, "Signing selector is invalid");
    assert_eq!(result.domain(), Some("example.com"));
    assert_eq!(result.selector(), None);
}

#[tokio::test]
async fn incompatible_version() {
    let result = validate_with(not_found(), &make_msg(&tags_with("v", Some("2")))).await;

    assert_failure(&result, "Incompatible DKIM version: 2");
}

#[tokio::test]
async fn unknown_canonicalization() {
    let result = validate_with(not_found(), &make_msg(&tags_with("c", Some("foo/simple")))).await;

    assert_failure(&result, "Unknown header canonicalization algorithm: foo");

    let result = validate_with(not_found(), &make_msg(&tags_with("c", Some("relaxed/bar")))).await;

    assert_failure(&result, "Unknown body canonicalization algorithm: bar");
}

#[tokio::test]
async fn body_length() {
    let result = validate_with(not_found(), &make_msg(&tags_with("l", Some("100")))).await;

    assert_failure(&result, "Body too short: 100/6");

    let result = validate_with(not_found(), &make_msg(&tags_with("l", Some("six")))).await;

    assert_eq!(
        result.failure(),
        Some(&ValidationFailure::InvalidBodyLength("six".into()))
    );
}

#[tokio::test]
async fn identity_domain_mismatch() {
    let msg = make_msg(&tags_with("i", Some("test@example.org")));

    let result = validate_with(not_found(), &msg).await;

    assert_failure(&result, "Agent or user identifier does not match domain: test@example.org");
}

#[tokio::test]
async fn from_header_not_signed() {
    let msg = make_msg(&tags_with("h", Some("Date:To:Subject")));

    let result = validate_with(not_found(), &msg).await;

    assert_failure(&result, "From header not included in signed header list: Date:To:Subject");
}

#[tokio::test]
async fn expired_signature() {
    // fixture time is 1700003600
    let msg = make_msg(&tags_with("x", Some("1600000000")));

    let result = validate_with(not_found(), &msg).await;

    assert_failure(&result, "Signature has expired.");

    let tags = tags_with("x", Some("1700007200")).replace("t=1570645905", "t=1700010000");

    let result = validate_with(not_found(), &make_msg(&tags)).await;

    assert_failure(&result, "Expiry time is before signature time.");
}

#[tokio::test]
async fn query_method() {
    let msg = make_msg(&tags_with("q", Some("abc/xyz")));

    let result = validate_with(not_found(), &msg).await;

    assert_failure(
        &result,
        "Public key unavailable (unknown q= query format), skipping signature",
    );

    // Without q= the default is used, and the key is looked up.
    let msg = make_msg(&tags_with("q", None));

    let result = validate_with(not_found(), &msg).await;

    assert_failure(&result, "Public key not found in DNS, skipping signature");
    assert_eq!(result.warnings(), ["Query method tag missing, defaulting to dns/txt"]);
    assert!(result.failure().unwrap().is_temporary());
}

#[tokio::test]
async fn invalid_key_record() {
    let resolver = common::static_lookup(&["v=DKIM1; k=rsa; nonsense"]);

    let result = validate_with(resolver, &make_msg(TAGS)).await;

    assert_failure(&result, "Public key record has invalid format, skipping signature");
}

#[tokio::test(start_paused = true)]
async fn key_lookup_timeout() {
    let resolver = MockLookup::new(|_| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, io::Error>(LookupOutput::new())
        })
    });

    let result = validate_with(resolver, &make_msg(TAGS)).await;

    assert_failure(&result, "Public key lookup timed out, skipping signature");
}

#[tokio::test]
async fn invalid_algorithm() {
    let resolver = common::static_lookup(&["v=DKIM1; k=rsa; p=abc"]);

    let result = validate_with(resolver.clone(), &make_msg(&tags_with("a", Some("rsa_sha256")))).await;

    assert_failure(&result, "'a' tag uses an invalid signature algorithm specifier");

    let result = validate_with(resolver, &make_msg(&tags_with("a", Some("rsa-md5")))).await;

    assert_failure(&result, "Signature algorithm md5 is not available");
}

#[tokio::test]
async fn body_hash_mismatch() {
    let resolver = common::static_lookup(&["v=DKIM1; k=rsa; p=abc"]);

    let msg = make_msg(TAGS).replace("\r\n\r\ntest", "\r\n\r\ntest!");

    let result = validate_with(resolver, &msg).await;

    assert_failure(&result, "Computed body hash does not match signature body hash");
}

#[tokio::test]
async fn key_record_checks() {
    let cases = [
        (
            "v=DKIM2; k=rsa; p=abc",
            "Public key version does not match signature version (example.com key #0)",
        ),
        (
            "v=DKIM1; h=sha1; p=abc",
            "Public key hash algorithm does not match signature hash algorithm (example.com key #0)",
        ),
        (
            "v=DKIM1; k=ed25519; p=abc",
            "Public key type does not match signature key type (example.com key #0)",
        ),
        (
            "v=DKIM1; s=web; p=abc",
            "Public key service type does not permit email usage (example.com key #0) web",
        ),
        ("v=DKIM1; k=rsa; p=", "Public key has been revoked (example.com key #0)"),
        ("v=DKIM1; k=rsa", "Public key record has no key data (example.com key #0)"),
    ];

    for (record, message) in cases {
        let result = validate_with(common::static_lookup(&[record]), &make_msg(TAGS)).await;

        assert_failure(&result, message);
        assert!(result.passes().contains(&"Body hash matches signature.".to_owned()));
    }

    // Lists in h= and s= are accepted when they contain a matching entry.
    let resolver = common::static_lookup(&["v=DKIM1; h=sha1:sha256; s=email:web; p="]);

    let result = validate_with(resolver, &make_msg(TAGS)).await;

    assert_failure(&result, "Public key has been revoked (example.com key #0)");
}

#[tokio::test]
async fn first_failing_key_ends_validation() {
    let resolver = common::static_lookup(&["v=DKIM2; p=abc", "v=DKIM1; p="]);

    let result = validate_with(resolver, &make_msg(TAGS)).await;

    assert_failure(
        &result,
        "Public key version does not match signature version (example.com key #0)",
    );
}

#[tokio::test]
async fn invalid_signature_encoding() {
    let resolver = common::static_lookup(&["v=DKIM1; k=rsa; p=abc"]);

    let msg = make_msg(TAGS).replace(SIGNATURE, "not%base64");

    let result = validate_with(resolver, &msg).await;

    assert_eq!(
        result.failure(),
        Some(&ValidationFailure::Crypto(CryptoError::InvalidEncoding))
    );
}

#[tokio::test]
async fn valid_rsa_relaxed() {
    let msg = common::read_message("tests/messages/rsa_relaxed.eml").await;

    let validator = common::validator(common::fixture_lookup());

    let results = validator.validate_bytes(&msg).await.unwrap();

    assert!(results.is_valid());

    let result = &results.results()[0];

    assert!(result.is_valid());
    assert!(result.fails().is_empty());
    assert_eq!(result.passes().last().unwrap(), "DKIM signature verified successfully!");
    assert_eq!(result.index(), Some(0));
    assert_eq!(result.domain(), Some("example.com"));
    assert_eq!(result.selector(), Some("sel2048"));

    assert!(validator.validate_boolean(&msg).await);
}

#[tokio::test]
async fn valid_rsa_relaxed_reformatted() {
    let msg = common::read_message("tests/messages/rsa_relaxed.eml").await;
    let msg = String::from_utf8(msg).unwrap();

    let validator = common::validator(common::fixture_lookup());

    // Line breaks normalized to LF, whitespace changes in signed headers.
    let msg = msg
        .replace("\r\n", "\n")
        .replace("Subject: Lunch tomorrow?", "Subject:   Lunch \t tomorrow?");

    assert!(validator.validate_boolean(&msg).await);
}

#[tokio::test]
async fn modified_body_fails() {
    let msg = common::read_message("tests/messages/rsa_relaxed.eml").await;
    let msg = String::from_utf8(msg).unwrap().replace("round the corner", "round the c0rner");

    let validator = common::validator(common::fixture_lookup());

    let results = validator.validate_bytes(&msg).await.unwrap();

    assert!(!results.is_valid());
    assert_eq!(
        results.results()[0].fails(),
        ["Computed body hash does not match signature body hash"]
    );
}

#[tokio::test]
async fn modified_header_fails() {
    let msg = common::read_message("tests/messages/rsa_relaxed.eml").await;
    let msg = String::from_utf8(msg).unwrap().replace("To: Bob", "To: Eve");

    let validator = common::validator(common::fixture_lookup());

    let results = validator.validate_bytes(&msg).await.unwrap();

    assert_eq!(
        results.results()[0].fails(),
        ["DKIM signature did not verify (example.com/sel2048 key #0)"]
    );
}

#[tokio::test]
async fn valid_ed25519_simple() {
    let msg = common::read_message("tests/messages/ed25519_simple.eml").await;

    let validator = common::validator(common::fixture_lookup());

    let results = validator.validate_bytes(&msg).await.unwrap();

    assert!(results.is_valid());
    assert_eq!(results.results()[0].domain(), Some("example.org"));

    // Simple header canonicalization does not tolerate whitespace changes.
    let msg = String::from_utf8(msg)
        .unwrap()
        .replace("Subject: Lunch tomorrow?", "Subject:  Lunch tomorrow?");

    assert!(!validator.validate_boolean(&msg).await);
}

#[tokio::test]
async fn ed25519_key_for_rsa_signature() {
    let msg = common::read_message("tests/messages/rsa_relaxed.eml").await;

    let key = common::read_public_key_file_base64("tests/keys/ed25519pub.pem").await.unwrap();
    let resolver = common::static_lookup(&[format!("v=DKIM1; p={key}").as_str()]);

    let validator = common::validator(resolver);

    let results = validator.validate_bytes(&msg).await.unwrap();

    assert!(matches!(
        results.results()[0].failure(),
        Some(ValidationFailure::Crypto(CryptoError::VerificationFailed(_)))
    ));
}

#[tokio::test]
async fn valid_body_length_with_appended_content() {
    let msg = common::read_message("tests/messages/rsa_body_length.eml").await;

    let validator = common::validator(common::fixture_lookup());

    let results = validator.validate_bytes(&msg).await.unwrap();

    assert!(results.is_valid());
    assert!(results.results()[0]
        .passes()
        .iter()
        .any(|p| p.starts_with("Optional body length tag is present and valid")));
}

#[tokio::test]
async fn any_valid_signature_makes_message_valid() {
    let msg = common::read_message("tests/messages/rsa_relaxed.eml").await;

    let mut with_broken = b"DKIM-Signature: v=1; a=rsa-sha256; d=example.com; s=gone;\r\n\
        \th=From; bh=abc; b=abc\r\n"
        .to_vec();
    with_broken.extend(msg);

    let message = Message::new(&with_broken).unwrap();

    let validator = common::validator(common::fixture_lookup());

    let results = validator.validate(&message).await.unwrap();

    assert!(results.is_valid());

    let results = results.results();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].index(), Some(0));
    assert_eq!(results[0].fails(), ["Public key not found in DNS, skipping signature"]);
    assert_eq!(results[1].index(), Some(1));
    assert!(results[1].is_valid());
}
