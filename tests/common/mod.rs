use dkim_validator::{Config, LookupTxt, Validator};
use std::{
    future::Future,
    io::{self, ErrorKind},
    pin::Pin,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::fs;

pub type LookupOutput = Vec<io::Result<Vec<u8>>>;
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<LookupOutput>> + Send + 'a>>;

#[derive(Clone)]
pub struct MockLookup(Arc<dyn Fn(&str) -> LookupFuture<'_> + Send + Sync>);

impl MockLookup {
    pub fn new(f: impl Fn(&str) -> LookupFuture<'_> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl LookupTxt for MockLookup {
    type Answer = LookupOutput;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let domain = domain.to_owned();

        Box::pin(async move { self.0(&domain).await })
    }
}

/// The instant the test fixtures were signed (t=1700000000), plus one hour.
pub fn fixture_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_003_600)
}

pub async fn read_public_key_file_base64(file_name: &str) -> io::Result<String> {
    let s = fs::read_to_string(file_name).await?;
    let mut key_base64: Vec<_> = s.lines().skip(1).collect();
    key_base64.pop();
    Ok(key_base64.join(""))
}

pub async fn read_message(file_name: &str) -> Vec<u8> {
    fs::read(file_name).await.unwrap()
}

/// A resolver that knows the key records of the test fixtures.
pub fn fixture_lookup() -> MockLookup {
    MockLookup::new(|name| {
        Box::pin(async move {
            match name {
                "sel2048._domainkey.example.com." => {
                    let base64 = read_public_key_file_base64("tests/keys/rsa2048pub.pem").await?;
                    Ok(vec![Ok(format!("v=DKIM1; k=rsa; p={base64}").into())])
                }
                "ed._domainkey.example.org." => {
                    let base64 = read_public_key_file_base64("tests/keys/ed25519pub.pem").await?;
                    Ok(vec![Ok(format!("v=DKIM1; k=ed25519; p={base64}").into())])
                }
                _ => Err(ErrorKind::NotFound.into()),
            }
        })
    })
}

/// A resolver that answers every query with the given key records.
pub fn static_lookup(records: &[&str]) -> MockLookup {
    let records: Vec<String> = records.iter().map(|r| r.to_string()).collect();

    MockLookup::new(move |_| {
        let answer: LookupOutput = records.iter().map(|r| Ok(r.clone().into_bytes())).collect();
        Box::pin(async move { Ok(answer) })
    })
}

pub fn validator(resolver: MockLookup) -> Validator<MockLookup> {
    let config = Config {
        fixed_system_time: Some(fixture_time()),
        ..Default::default()
    };

    Validator::new(resolver, config)
}
