// src/pac/helper.rs
use super::directive::{parse_directives, ProxyDirectiveList};
use super::environment::ScriptEnvironment;
use super::program::PacProgram;
use super::source::PacSource;
use crate::error::{PacError, Result};
use url::{Host, Url};

/// Loads a PAC script once and turns its answers into proxy directives.
#[derive(Debug)]
pub struct PacHelper {
    program: PacProgram,
}

impl PacHelper {
    /// Loads `source` into the process-wide environment.
    pub fn new(source: &PacSource) -> Result<Self> {
        Self::with_environment(ScriptEnvironment::global()?, source)
    }

    pub fn with_environment(env: &ScriptEnvironment, source: &PacSource) -> Result<Self> {
        Ok(Self {
            program: PacProgram::load(env, source)?,
        })
    }

    pub fn from_program(program: PacProgram) -> Self {
        Self { program }
    }

    pub fn program(&mut self) -> &mut PacProgram {
        &mut self.program
    }

    /// Directives for `(url, host)`, most preferred first. A script that
    /// returns nothing yields an empty list.
    pub fn proxy_directives(&mut self, url: &str, host: &str) -> Result<ProxyDirectiveList> {
        let raw = self.program.find_proxy_for_url(url, host)?;
        Ok(parse_directives(raw.as_deref()))
    }

    /// Same as [`proxy_directives`](Self::proxy_directives) through `FindProxyForURLEx`.
    pub fn proxy_directives_ex(&mut self, url: &str, host: &str) -> Result<ProxyDirectiveList> {
        let raw = self.program.find_proxy_for_url_ex(url, host)?;
        Ok(parse_directives(raw.as_deref()))
    }

    /// Directives for `url`, taking the host from the URL itself.
    pub fn proxy_directives_for_url(&mut self, url: &str) -> Result<ProxyDirectiveList> {
        let host = host_of(url)?;
        self.proxy_directives(url, &host)
    }
}

/// The host component of `url`, IPv6 literals without brackets.
pub fn host_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| PacError::InvalidUrl {
        url: url.to_string(),
        source: e,
    })?;

    match parsed.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(PacError::MissingHost(url.to_string())),
    }
}
