// src/pac/program.rs
use super::environment::ScriptEnvironment;
use super::source::PacSource;
use crate::error::{PacError, Result};
use boa_engine::{Context, JsString, JsValue, Source};
use std::fmt;

pub const FIND_PROXY_FOR_URL: &str = "FindProxyForURL";
pub const FIND_PROXY_FOR_URL_EX: &str = "FindProxyForURLEx";

/// A PAC script evaluated into its own engine context.
///
/// The context is not thread-safe, so a program stays on the thread that
/// loaded it and calls take `&mut self`.
pub struct PacProgram {
    context: Context,
    origin: String,
}

impl fmt::Debug for PacProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacProgram")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl PacProgram {
    /// Reads and evaluates `source` once. The script is not required to
    /// define `FindProxyForURL`; that is only checked when it is called.
    pub fn load(env: &ScriptEnvironment, source: &PacSource) -> Result<Self> {
        let origin = source.origin();
        let script = source.read(env.fetch())?;
        Self::evaluate(env, script.as_str(), origin)
    }

    pub fn from_code(env: &ScriptEnvironment, code: &str) -> Result<Self> {
        Self::load(env, &PacSource::code(code))
    }

    fn evaluate(env: &ScriptEnvironment, script: &str, origin: String) -> Result<Self> {
        let mut context = env.new_context()?;

        context
            .eval(Source::from_bytes(script.as_bytes()))
            .map_err(|e| PacError::ScriptLoad {
                origin: origin.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(%origin, bytes = script.len(), "Loaded PAC script");
        Ok(Self { context, origin })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether the script defines a callable global named `name`.
    pub fn defines(&mut self, name: &str) -> bool {
        let global = self.context.global_object();
        global
            .get(JsString::from(name), &mut self.context)
            .map(|value| value.is_callable())
            .unwrap_or(false)
    }

    /// Calls `FindProxyForURL(url, host)`. `Ok(None)` when the script returns
    /// `null` or `undefined`.
    pub fn find_proxy_for_url(&mut self, url: &str, host: &str) -> Result<Option<String>> {
        self.call(FIND_PROXY_FOR_URL, url, host)
    }

    /// Calls `FindProxyForURLEx(url, host)`, the IPv6-aware variant.
    pub fn find_proxy_for_url_ex(&mut self, url: &str, host: &str) -> Result<Option<String>> {
        self.call(FIND_PROXY_FOR_URL_EX, url, host)
    }

    fn call(&mut self, function: &'static str, url: &str, host: &str) -> Result<Option<String>> {
        let evaluation_error = |message: String| PacError::ScriptEvaluation { function, message };

        let global = self.context.global_object();
        let func_val = global
            .get(JsString::from(function), &mut self.context)
            .map_err(|e| evaluation_error(e.to_string()))?;

        let func = func_val
            .as_callable()
            .ok_or_else(|| evaluation_error(format!("{function} is not a function")))?;

        let args = [
            JsValue::from(JsString::from(url)),
            JsValue::from(JsString::from(host)),
        ];

        let result = func
            .call(&JsValue::undefined(), &args, &mut self.context)
            .map_err(|e| evaluation_error(e.to_string()))?;

        if result.is_null_or_undefined() {
            tracing::debug!(origin = %self.origin, function, url, "PAC script returned no result");
            return Ok(None);
        }

        let js_str = result
            .to_string(&mut self.context)
            .map_err(|e| evaluation_error(e.to_string()))?;
        let raw = js_str.to_std_string_escaped();
        tracing::debug!(origin = %self.origin, function, url, host, raw = %raw, "PAC script result");
        Ok(Some(raw))
    }
}
