//! Response header collection.
//!
//! [`Headers`] wraps the header multimap with a claim mechanism: a
//! security interceptor can reserve a name so that nothing else in the
//! request's lifetime can overwrite what it is about to set. Cookies are
//! appended as separate `Set-Cookie` entries and validated for
//! well-formed names.
use std::collections::HashSet;

use http::header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue, SET_COOKIE};

/// Typed response-header collection with claimable names.
#[derive(Debug, Default)]
pub struct Headers {
    map: HeaderMap,
    claimed: HashSet<HeaderName>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers::default()
    }

    /// Returns the first value for `name`.
    pub fn get<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.map.get(name)
    }

    /// Returns every value for `name` in insertion order.
    pub fn get_all<K: AsHeaderName>(&self, name: K) -> impl Iterator<Item = &HeaderValue> {
        self.map.get_all(name).into_iter()
    }

    pub fn contains<K: AsHeaderName>(&self, name: K) -> bool {
        self.map.contains_key(name)
    }

    /// Replace the value of `name`.
    ///
    /// Fails if the name has been claimed.
    pub fn set(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), HeaderError> {
        self.check_unclaimed(&name)?;
        self.map.insert(name, value);
        Ok(())
    }

    /// Append a value to `name`, keeping existing ones.
    ///
    /// Fails if the name has been claimed.
    pub fn add(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), HeaderError> {
        self.check_unclaimed(&name)?;
        self.map.append(name, value);
        Ok(())
    }

    /// Remove every value of `name`.
    ///
    /// Fails if the name has been claimed.
    pub fn remove(&mut self, name: HeaderName) -> Result<(), HeaderError> {
        self.check_unclaimed(&name)?;
        self.map.remove(&name);
        Ok(())
    }

    /// Reserve `name` against mutation.
    ///
    /// The returned [`Claim`] is the only way left to write the header,
    /// via [`set_claimed`][Headers::set_claimed]. Claiming an
    /// already-claimed name fails.
    pub fn claim(&mut self, name: HeaderName) -> Result<Claim, HeaderError> {
        if !self.claimed.insert(name.clone()) {
            return Err(HeaderError::AlreadyClaimed(name));
        }
        Ok(Claim { name })
    }

    /// Write a claimed header through its claim token.
    pub fn set_claimed(&mut self, claim: &Claim, value: HeaderValue) {
        self.map.insert(claim.name.clone(), value);
    }

    /// Append a `Set-Cookie` entry for `cookie`.
    ///
    /// Fails if the cookie name is empty or malformed, or if `Set-Cookie`
    /// has been claimed.
    pub fn set_cookie(&mut self, cookie: &Cookie) -> Result<(), HeaderError> {
        let value = cookie.header_value()?;
        self.check_unclaimed(&SET_COOKIE)?;
        self.map.append(SET_COOKIE, value);
        Ok(())
    }

    /// The underlying map.
    pub fn map(&self) -> &HeaderMap {
        &self.map
    }

    // the task sets framework headers without going through the claim
    // guard, mirroring direct access to the underlying writer
    pub(crate) fn force_set(&mut self, name: HeaderName, value: HeaderValue) {
        self.map.insert(name, value);
    }

    pub(crate) fn snapshot(&self) -> HeaderMap {
        self.map.clone()
    }

    fn check_unclaimed(&self, name: &HeaderName) -> Result<(), HeaderError> {
        if self.claimed.contains(name) {
            return Err(HeaderError::Claimed(name.clone()));
        }
        Ok(())
    }
}

/// Token returned by [`Headers::claim`]; holding it authorises writes to
/// the claimed name.
#[derive(Debug)]
pub struct Claim {
    name: HeaderName,
}

impl Claim {
    pub fn name(&self) -> &HeaderName {
        &self.name
    }
}

// ===== Cookie =====

/// A `Set-Cookie` entry.
///
/// New cookies default to `HttpOnly; Secure; SameSite=Lax`; each
/// protection has to be relaxed explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Cookie {
        Cookie {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn path(mut self, path: impl Into<String>) -> Cookie {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Cookie {
        self.domain = Some(domain.into());
        self
    }

    /// Lifetime in seconds; zero or negative expires the cookie now.
    pub fn max_age(mut self, seconds: i64) -> Cookie {
        self.max_age = Some(seconds.max(0));
        self
    }

    /// Drop the `Secure` attribute.
    pub fn insecure(mut self) -> Cookie {
        self.secure = false;
        self
    }

    /// Drop the `HttpOnly` attribute.
    pub fn allow_js_access(mut self) -> Cookie {
        self.http_only = false;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Cookie {
        self.same_site = same_site;
        self
    }

    pub(crate) fn header_value(&self) -> Result<HeaderValue, HeaderError> {
        if self.name.is_empty() || !self.name.bytes().all(is_cookie_name_byte) {
            return Err(HeaderError::InvalidCookieName);
        }

        let mut out = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(max_age) = self.max_age {
            out.push_str("; Max-Age=");
            out.push_str(&max_age.to_string());
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        out.push_str("; SameSite=");
        out.push_str(match self.same_site {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        });

        HeaderValue::from_str(&out).map_err(|_| HeaderError::InvalidCookie)
    }
}

// RFC 6265 cookie-name is an HTTP token
fn is_cookie_name_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}

// ===== Error =====

/// Header-collection failure; returned to the caller, never fatal to the
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// Write attempt on a claimed name.
    Claimed(HeaderName),
    /// Claim attempt on a name that is already claimed.
    AlreadyClaimed(HeaderName),
    /// Cookie name empty or containing non-token characters.
    InvalidCookieName,
    /// Cookie could not be encoded as a header value.
    InvalidCookie,
}

impl std::error::Error for HeaderError {}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claimed(name) => write!(f, "header {name:?} is claimed"),
            Self::AlreadyClaimed(name) => write!(f, "header {name:?} was already claimed"),
            Self::InvalidCookieName => f.write_str("invalid cookie name"),
            Self::InvalidCookie => f.write_str("cookie is not encodable as a header value"),
        }
    }
}
