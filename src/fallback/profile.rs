//! Header profiles
//!
//! A profile is a named set of request headers imitating one kind of client.
//! The gateway tries them in table order, so the table is part of the
//! observable behaviour and is versioned.

use hyper::header::{HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use std::sync::Arc;
use thiserror::Error;

/// Bumped whenever the built-in profile table changes.
pub const PROFILE_TABLE_VERSION: u32 = 1;

const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MOBILE_SAFARI_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile set must contain at least one profile")]
    Empty,
    #[error("profile '{profile}': invalid header name '{name}': {source}")]
    InvalidName {
        profile: String,
        name: String,
        source: InvalidHeaderName,
    },
    #[error("profile '{profile}': invalid value for header '{name}': {source}")]
    InvalidValue {
        profile: String,
        name: String,
        source: InvalidHeaderValue,
    },
}

/// A named, ordered list of headers sent verbatim on one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    name: String,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderProfile {
    /// Build a profile, validating every header up front
    pub fn new(name: impl Into<String>, headers: &[(&str, &str)]) -> Result<Self, ProfileError> {
        let name = name.into();
        let mut parsed = Vec::with_capacity(headers.len());

        for (header, value) in headers {
            let header_name =
                HeaderName::from_bytes(header.as_bytes()).map_err(|source| {
                    ProfileError::InvalidName {
                        profile: name.clone(),
                        name: (*header).to_string(),
                        source,
                    }
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|source| ProfileError::InvalidValue {
                    profile: name.clone(),
                    name: (*header).to_string(),
                    source,
                })?;
            parsed.push((header_name, header_value));
        }

        Ok(Self {
            name,
            headers: parsed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Headers in the order they were declared
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }
}

/// Immutable, non-empty, ordered collection of profiles
///
/// Cloning is cheap; every clone shares the same table.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: Arc<[HeaderProfile]>,
}

impl ProfileSet {
    pub fn new(profiles: Vec<HeaderProfile>) -> Result<Self, ProfileError> {
        if profiles.is_empty() {
            return Err(ProfileError::Empty);
        }
        Ok(Self {
            profiles: profiles.into(),
        })
    }

    /// The built-in table: desktop browser, mobile browser, minimal client
    ///
    /// `site` fills the `Referer`/`Origin` headers some upstreams check.
    /// Profiles simply omit them when no identity is configured.
    pub fn builtin(site: &SiteIdentity) -> Result<Self, ProfileError> {
        let referer = site.referer.as_deref();
        let origin = site.origin.as_deref();

        let mut desktop = vec![
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("User-Agent", DESKTOP_CHROME_UA),
        ];
        push_identity(&mut desktop, referer, origin);
        desktop.extend([
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "same-site"),
            ("Cache-Control", "no-cache"),
            ("Pragma", "no-cache"),
            ("DNT", "1"),
            ("Connection", "keep-alive"),
        ]);

        let mut mobile = vec![
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "en-US,en;q=0.9"),
            ("User-Agent", MOBILE_SAFARI_UA),
        ];
        push_identity(&mut mobile, referer, origin);
        mobile.push(("X-Requested-With", "XMLHttpRequest"));

        let mut minimal = vec![
            ("Accept", "application/json"),
            ("User-Agent", DESKTOP_CHROME_UA),
        ];
        push_identity(&mut minimal, referer, None);

        Self::new(vec![
            HeaderProfile::new("Standard Browser Headers", &desktop)?,
            HeaderProfile::new("Mobile Browser Headers", &mobile)?,
            HeaderProfile::new("Minimal Headers", &minimal)?,
        ])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[cfg(test)]
    pub fn first(&self) -> &HeaderProfile {
        &self.profiles[0]
    }

    /// The least fingerprinted profile, used by the upstream probe
    pub fn last(&self) -> &HeaderProfile {
        &self.profiles[self.profiles.len() - 1]
    }
}

impl<'a> IntoIterator for &'a ProfileSet {
    type Item = &'a HeaderProfile;
    type IntoIter = std::slice::Iter<'a, HeaderProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Site the gateway pretends to be browsing from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteIdentity {
    pub referer: Option<String>,
    pub origin: Option<String>,
}

fn push_identity<'a>(
    headers: &mut Vec<(&'a str, &'a str)>,
    referer: Option<&'a str>,
    origin: Option<&'a str>,
) {
    if let Some(referer) = referer {
        headers.push(("Referer", referer));
    }
    if let Some(origin) = origin {
        headers.push(("Origin", origin));
    }
}
