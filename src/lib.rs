// src/lib.rs
//! Proxy auto-config (PAC) evaluation.
//!
//! A PAC script defines `FindProxyForURL(url, host)` and answers with a
//! string such as `"PROXY proxy.example.com:3128; DIRECT"`. This crate runs
//! the script in an embedded JavaScript engine seeded with the standard PAC
//! helper functions and turns the answer into an ordered list of
//! [`ProxyDirective`]s to try in turn.
//!
//! ```no_run
//! use pacproxy::{PacHelper, PacSource};
//!
//! let mut helper = PacHelper::new(&PacSource::location("/etc/proxy.pac"))?;
//! for directive in helper.proxy_directives_for_url("https://example.com/")? {
//!     println!("{directive}");
//! }
//! # Ok::<(), pacproxy::PacError>(())
//! ```
pub mod config;
pub mod error;
pub mod log;
pub mod pac;
pub mod resolver;

pub use config::Config;
pub use error::{PacError, Result};
pub use pac::{
    parse_directives, PacHelper, PacProgram, PacSource, ProxyDirective, ProxyDirectiveList,
    ScriptEnvironment,
};
pub use resolver::{HostResolver, StaticResolver, SystemResolver};

/// Loads `source` into the process-wide environment and resolves `url` once.
///
/// Callers resolving more than one URL should keep a [`PacHelper`] instead,
/// so the script is evaluated only once.
pub fn find_proxy_for_url(source: &PacSource, url: &str) -> Result<ProxyDirectiveList> {
    let mut helper = PacHelper::new(source)?;
    let directives = helper.proxy_directives_for_url(url)?;

    if directives.is_empty() {
        tracing::info!("PAC returned no directives for {}", url);
    } else {
        tracing::info!(
            "PAC resolved {} directive(s) for {}, first: {}",
            directives.len(),
            url,
            directives[0]
        );
    }
    Ok(directives)
}
