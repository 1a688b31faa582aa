// src/pac/mod.rs
pub mod directive;
pub mod downloader;
pub mod environment;
pub mod helper;
pub mod predicates;
pub mod program;
pub mod source;

pub use directive::{
    parse_directives, parse_directives_str, ProxyDirective, ProxyDirectiveList, DEFAULT_SOCKS_PORT,
};
pub use environment::{ScriptEnvironment, ScriptEnvironmentBuilder};
pub use helper::PacHelper;
pub use program::{PacProgram, FIND_PROXY_FOR_URL, FIND_PROXY_FOR_URL_EX};
pub use source::PacSource;
