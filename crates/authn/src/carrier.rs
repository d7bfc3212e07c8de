//! Transport capabilities the gate needs from a request.
//!
//! The gate only ever asks three things of a request: a header value, a query
//! parameter, and the remote user. [`TokenCarrier`] names that set so the gate
//! works over `http::Request` as well as any in-house request type.

use http::Request;
use trusted_login_session::UserIdentity;

use crate::binder::Binding;

/// A request the trusted-login token can be read from.
pub trait TokenCarrier {
    /// Raw bytes of the first header named `name`, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&[u8]>;

    /// Percent-decoded value of the first request parameter named `name`.
    ///
    /// The [`http::Request`] impl reads only the URI query string, since the
    /// body is not available without consuming it. A carrier that has already
    /// buffered an `application/x-www-form-urlencoded` body may answer from
    /// the body as well, so a token posted as a form field is honoured too.
    fn query_param(&self, name: &str) -> Option<String>;

    /// The authenticated remote user the transport reports, if any.
    fn remote_user(&self) -> Option<&str>;
}

/// Request extension carrying the transport-authenticated user of an
/// [`http::Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

impl<B> TokenCarrier for Request<B> {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers().get(name).map(http::HeaderValue::as_bytes)
    }

    fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    fn remote_user(&self) -> Option<&str> {
        self.extensions().get::<RemoteUser>().map(|user| user.0.as_str())
    }
}

/// The request handed downstream by the gate.
///
/// Everything except the remote user is the wrapped request's own; the remote
/// user reflects the impersonated identity while one is bound.
#[derive(Debug)]
pub struct GatedRequest<R> {
    inner: R,
    binding: Binding,
}

impl<R> GatedRequest<R> {
    /// Wraps `inner` with the binding it runs under.
    #[must_use]
    pub fn new(inner: R, binding: Binding) -> Self {
        Self { inner, binding }
    }

    /// The wrapped request.
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwraps the request.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// How the trusted-login filter bound this request.
    #[must_use]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// The impersonated identity, if one is bound.
    #[must_use]
    pub fn impersonated(&self) -> Option<&UserIdentity> {
        self.binding.identity()
    }
}

impl<R: TokenCarrier> TokenCarrier for GatedRequest<R> {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.inner.header(name)
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.inner.query_param(name)
    }

    fn remote_user(&self) -> Option<&str> {
        match &self.binding {
            Binding::Impersonated(identity) => Some(identity.eid.as_str()),
            _ => self.inner.remote_user(),
        }
    }
}
