//! Proof validation
//!
//! Pure checks over user submitted completion evidence: social profile urls and transaction
//! hashes. [`validate_proof`] applies them to whatever known shape a [`Proof`] carries.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use rdk_common::{Error, Proof, TxHash};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

fn compile(pattern: &str) -> Regex {
    // Only ever called with the constant patterns below
    Regex::new(pattern).expect("constant pattern compiles")
}

static TX_HASH: LazyLock<Regex> = LazyLock::new(|| compile(r"^0x[0-9a-fA-F]{64}$"));

static TWITTER_PATH: LazyLock<Regex> = LazyLock::new(|| compile(r"^/[A-Za-z0-9_]{1,15}/?$"));
static GITHUB_PATH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^/[A-Za-z0-9](?:[A-Za-z0-9]|-[A-Za-z0-9]){0,38}/?$"));
static FARCASTER_PATH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^/[a-z0-9][a-z0-9-]{0,15}(?:\.eth)?/?$"));
static LINKEDIN_PATH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^/in/[A-Za-z0-9_-]{3,100}/?$"));
static TELEGRAM_PATH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^/[A-Za-z][A-Za-z0-9_]{4,31}/?$"));

/// Social platform a profile url belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Twitter / X
    Twitter,
    /// GitHub
    Github,
    /// Farcaster (Warpcast)
    Farcaster,
    /// LinkedIn
    Linkedin,
    /// Telegram
    Telegram,
}

impl ProfileKind {
    /// All supported platforms
    pub const ALL: [ProfileKind; 5] = [
        ProfileKind::Twitter,
        ProfileKind::Github,
        ProfileKind::Farcaster,
        ProfileKind::Linkedin,
        ProfileKind::Telegram,
    ];

    fn accepts_host(&self, host: &str) -> bool {
        match self {
            ProfileKind::Twitter => matches!(
                host,
                "twitter.com" | "www.twitter.com" | "mobile.twitter.com" | "x.com" | "www.x.com"
            ),
            ProfileKind::Github => matches!(host, "github.com" | "www.github.com"),
            ProfileKind::Farcaster => {
                matches!(host, "warpcast.com" | "www.warpcast.com" | "farcaster.xyz")
            }
            ProfileKind::Linkedin => {
                host == "linkedin.com"
                    || host
                        .strip_suffix(".linkedin.com")
                        .is_some_and(|sub| sub == "www" || sub.len() == 2)
            }
            ProfileKind::Telegram => matches!(host, "t.me" | "telegram.me"),
        }
    }

    fn path_regex(&self) -> &'static Regex {
        match self {
            ProfileKind::Twitter => &TWITTER_PATH,
            ProfileKind::Github => &GITHUB_PATH,
            ProfileKind::Farcaster => &FARCASTER_PATH,
            ProfileKind::Linkedin => &LINKEDIN_PATH,
            ProfileKind::Telegram => &TELEGRAM_PATH,
        }
    }

    /// Platform whose hosts include `host`
    pub fn from_host(host: &str) -> Option<ProfileKind> {
        let host = host.to_lowercase();
        ProfileKind::ALL
            .into_iter()
            .find(|kind| kind.accepts_host(&host))
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProfileKind::Twitter => "twitter",
            ProfileKind::Github => "github",
            ProfileKind::Farcaster => "farcaster",
            ProfileKind::Linkedin => "linkedin",
            ProfileKind::Telegram => "telegram",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ProfileKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(ProfileKind::Twitter),
            "github" => Ok(ProfileKind::Github),
            "farcaster" | "warpcast" => Ok(ProfileKind::Farcaster),
            "linkedin" => Ok(ProfileKind::Linkedin),
            "telegram" => Ok(ProfileKind::Telegram),
            _ => Err(Error::Validation(format!("Unsupported profile platform `{s}`"))),
        }
    }
}

/// Check a profile url against the host and path pattern of `kind`
pub fn validate_profile_url(kind: ProfileKind, url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url.trim())
        .map_err(|err| Error::Validation(format!("Invalid {kind} profile url `{url}`: {err}")))?;

    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(Error::Validation(format!(
            "Profile url must use http(s): `{url}`"
        )));
    }

    let host = parsed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| Error::Validation(format!("Profile url has no host: `{url}`")))?;

    if !kind.accepts_host(&host) {
        return Err(Error::Validation(format!(
            "`{host}` is not a {kind} host"
        )));
    }

    if !kind.path_regex().is_match(parsed.path()) {
        return Err(Error::Validation(format!(
            "`{}` is not a {kind} profile path",
            parsed.path()
        )));
    }

    Ok(parsed)
}

/// Check a transaction hash is `0x` followed by 64 hex characters
pub fn validate_transaction_hash(hash: &str) -> Result<TxHash, Error> {
    if !TX_HASH.is_match(hash) {
        return Err(Error::Validation(format!(
            "Invalid transaction hash `{hash}`"
        )));
    }

    Ok(TxHash::from_str(hash)?)
}

/// Validate the known shapes a proof carries.
///
/// A `txHash` must be a well formed hash, a profile `url` must match its `platform` (or the
/// platform its host belongs to). Proofs with no known shape pass untouched.
pub fn validate_proof(proof: &Proof) -> Result<(), Error> {
    if let Some(hash) = proof.as_tx_hash() {
        validate_transaction_hash(hash)?;
    }

    if let Some(url) = proof.as_url() {
        let kind = match proof.platform() {
            Some(platform) => ProfileKind::from_str(platform)?,
            None => Url::parse(url)
                .ok()
                .and_then(|parsed| parsed.host_str().and_then(ProfileKind::from_host))
                .ok_or_else(|| {
                    Error::Validation(format!("Cannot tell which platform `{url}` belongs to"))
                })?,
        };

        validate_profile_url(kind, url)?;
    }

    Ok(())
}
