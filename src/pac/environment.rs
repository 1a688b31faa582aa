// src/pac/environment.rs
//! The script environment every PAC program runs in.
//!
//! A [`ScriptEnvironment`] is built once and shared. Each program gets a fresh
//! engine context from [`ScriptEnvironment::new_context`] with the PAC
//! function library installed, so programs never see each other's globals.

use super::predicates::{self, RangeArg};
use crate::config::{Config, EngineConfig, FetchConfig};
use crate::error::{PacError, Result};
use crate::resolver::{self, HostResolver, SystemResolver};
use boa_engine::{Context, JsResult, JsString, JsValue, NativeFunction, Source};
use boa_gc::{Finalize, Trace};
use chrono::{Local, NaiveDateTime, Utc};
use std::borrow::Cow;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};

/// JavaScript half of the PAC library, evaluated after the native functions.
pub const PRELUDE: &str = include_str!("prelude.js");

pub struct ScriptEnvironment {
    resolver: Arc<dyn HostResolver>,
    engine: EngineConfig,
    fetch: FetchConfig,
    prelude: Cow<'static, str>,
}

impl fmt::Debug for ScriptEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEnvironment")
            .field("engine", &self.engine)
            .field("fetch", &self.fetch)
            .field("prelude_len", &self.prelude.len())
            .finish_non_exhaustive()
    }
}

pub struct ScriptEnvironmentBuilder {
    resolver: Arc<dyn HostResolver>,
    engine: EngineConfig,
    fetch: FetchConfig,
    prelude: Cow<'static, str>,
}

impl ScriptEnvironmentBuilder {
    pub fn resolver<R: HostResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn shared_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Replaces the bundled JavaScript helper library.
    pub fn prelude(mut self, prelude: impl Into<Cow<'static, str>>) -> Self {
        self.prelude = prelude.into();
        self
    }

    /// Builds the environment and checks that the library installs cleanly.
    pub fn build(self) -> Result<ScriptEnvironment> {
        let env = ScriptEnvironment {
            resolver: self.resolver,
            engine: self.engine,
            fetch: self.fetch,
            prelude: self.prelude,
        };
        env.new_context()?;
        tracing::debug!(?env, "PAC script environment ready");
        Ok(env)
    }
}

impl ScriptEnvironment {
    pub fn builder() -> ScriptEnvironmentBuilder {
        ScriptEnvironmentBuilder {
            resolver: Arc::new(SystemResolver),
            engine: EngineConfig::default(),
            fetch: FetchConfig::default(),
            prelude: Cow::Borrowed(PRELUDE),
        }
    }

    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder()
            .engine(config.engine)
            .fetch(config.fetch)
            .build()
    }

    /// The process-wide environment, built on first use with the system
    /// resolver and default limits. A construction failure is remembered and
    /// returned on every call.
    pub fn global() -> Result<&'static ScriptEnvironment> {
        static GLOBAL: OnceLock<std::result::Result<ScriptEnvironment, String>> = OnceLock::new();

        GLOBAL
            .get_or_init(|| {
                ScriptEnvironment::new().map_err(|e| match e {
                    PacError::Environment(message) => message,
                    other => other.to_string(),
                })
            })
            .as_ref()
            .map_err(|message| PacError::Environment(message.clone()))
    }

    pub fn fetch(&self) -> &FetchConfig {
        &self.fetch
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn resolver(&self) -> &dyn HostResolver {
        self.resolver.as_ref()
    }

    /// A fresh engine context with runtime limits and the PAC library installed.
    pub(crate) fn new_context(&self) -> Result<Context> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.engine.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.engine.recursion_limit);

        self.install(&mut context)
            .map_err(|e| PacError::Environment(e.to_string()))?;
        Ok(context)
    }

    fn install(&self, context: &mut Context) -> JsResult<()> {
        register_host_functions(context, &self.resolver)?;
        register_predicates(context, &self.resolver)?;
        context.eval(Source::from_bytes(self.prelude.as_bytes()))?;
        Ok(())
    }
}

fn register(context: &mut Context, name: &str, length: usize, body: NativeFunction) -> JsResult<()> {
    context.register_global_callable(JsString::from(name), length, body)
}

fn string_arg(args: &[JsValue], index: usize) -> Option<String> {
    args.get(index)
        .and_then(JsValue::as_string)
        .map(JsString::to_std_string_escaped)
}

fn nullable_string(value: Option<String>) -> JsValue {
    value.map_or_else(JsValue::null, |s| JsValue::from(JsString::from(s)))
}

/// Resolver handle carried by a native function. It holds no engine values,
/// so the collector has nothing to trace in it.
#[derive(Trace, Finalize)]
struct ResolverCapture {
    #[unsafe_ignore_trace]
    resolver: Arc<dyn HostResolver>,
}

/// Native function whose body needs the host resolver.
fn with_resolver<F>(resolver: &Arc<dyn HostResolver>, body: F) -> NativeFunction
where
    F: Fn(&dyn HostResolver, &[JsValue]) -> JsValue + Copy + 'static,
{
    NativeFunction::from_copy_closure_with_captures(
        move |_this, args, capture: &ResolverCapture, _ctx| {
            Ok(body(capture.resolver.as_ref(), args))
        },
        ResolverCapture {
            resolver: Arc::clone(resolver),
        },
    )
}

fn register_host_functions(context: &mut Context, resolver: &Arc<dyn HostResolver>) -> JsResult<()> {
    register(
        context,
        "dnsResolve",
        1,
        with_resolver(resolver, |r, args| {
            let host = string_arg(args, 0).unwrap_or_default();
            nullable_string(resolver::resolve_host(r, &host))
        }),
    )?;

    register(
        context,
        "dnsResolveEx",
        1,
        with_resolver(resolver, |r, args| {
            let host = string_arg(args, 0).unwrap_or_default();
            nullable_string(resolver::resolve_host_all(r, &host))
        }),
    )?;

    register(
        context,
        "myIpAddress",
        0,
        with_resolver(resolver, |r, _args| {
            JsValue::from(JsString::from(resolver::my_ip_address(r)))
        }),
    )?;

    register(
        context,
        "myIpAddressEx",
        0,
        with_resolver(resolver, |r, _args| {
            JsValue::from(JsString::from(resolver::my_ip_address_ex(r)))
        }),
    )?;

    Ok(())
}

/// An address for `isInNet`: IP literals pass through, names are resolved.
fn address_of(resolver: &dyn HostResolver, host: &str) -> Option<String> {
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Some(host.to_string());
    }
    resolver::resolve_host(resolver, host)
}

fn register_predicates(context: &mut Context, resolver: &Arc<dyn HostResolver>) -> JsResult<()> {
    register(
        context,
        "isPlainHostName",
        1,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let host = string_arg(args, 0).unwrap_or_default();
            Ok(predicates::is_plain_host_name(&host).into())
        }),
    )?;

    register(
        context,
        "dnsDomainIs",
        2,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let host = string_arg(args, 0).unwrap_or_default();
            let domain = string_arg(args, 1).unwrap_or_default();
            Ok(predicates::dns_domain_is(&host, &domain).into())
        }),
    )?;

    register(
        context,
        "localHostOrDomainIs",
        2,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let host = string_arg(args, 0).unwrap_or_default();
            let hostdom = string_arg(args, 1).unwrap_or_default();
            Ok(predicates::local_host_or_domain_is(&host, &hostdom).into())
        }),
    )?;

    register(
        context,
        "dnsDomainLevels",
        1,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let host = string_arg(args, 0).unwrap_or_default();
            let levels = i32::try_from(predicates::dns_domain_levels(&host)).unwrap_or(i32::MAX);
            Ok(JsValue::from(levels))
        }),
    )?;

    register(
        context,
        "shExpMatch",
        2,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let value = string_arg(args, 0).unwrap_or_default();
            let pattern = string_arg(args, 1).unwrap_or_default();
            Ok(predicates::sh_exp_match(&value, &pattern).into())
        }),
    )?;

    register(
        context,
        "isInNet",
        3,
        with_resolver(resolver, |r, args| {
            let (Some(host), Some(pattern), Some(mask)) =
                (string_arg(args, 0), string_arg(args, 1), string_arg(args, 2))
            else {
                return false.into();
            };
            let in_net = address_of(r, &host)
                .filter(|ip| ip.parse::<Ipv4Addr>().is_ok())
                .is_some_and(|ip| predicates::is_in_net(&ip, &pattern, &mask));
            in_net.into()
        }),
    )?;

    register(
        context,
        "isInNetEx",
        2,
        with_resolver(resolver, |r, args| {
            let (Some(host), Some(prefix)) = (string_arg(args, 0), string_arg(args, 1)) else {
                return false.into();
            };
            address_of(r, &host)
                .is_some_and(|ip| predicates::is_in_net_ex(&ip, &prefix))
                .into()
        }),
    )?;

    register(
        context,
        "sortIpAddressList",
        1,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let list = string_arg(args, 0).unwrap_or_default();
            Ok(match predicates::sort_ip_address_list(&list) {
                Some(sorted) => JsString::from(sorted).into(),
                None => false.into(),
            })
        }),
    )?;

    register(
        context,
        "weekdayRange",
        3,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let (args, gmt) = range_args(args);
            Ok(predicates::weekday_range(now(gmt), &args).into())
        }),
    )?;

    register(
        context,
        "dateRange",
        7,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let (args, gmt) = range_args(args);
            Ok(predicates::date_range(now(gmt), &args).into())
        }),
    )?;

    register(
        context,
        "timeRange",
        7,
        NativeFunction::from_fn_ptr(|_this, args, _ctx| {
            let (args, gmt) = range_args(args);
            Ok(predicates::time_range(now(gmt), &args).into())
        }),
    )?;

    register(
        context,
        "alert",
        1,
        NativeFunction::from_fn_ptr(|_this, args, ctx| {
            let message = match args.first() {
                Some(value) => value.to_string(ctx)?.to_std_string_escaped(),
                None => String::new(),
            };
            tracing::info!(target: "pacproxy::alert", "{}", message);
            Ok(JsValue::undefined())
        }),
    )?;

    Ok(())
}

/// Converts date/time predicate arguments, stripping a trailing `"GMT"`.
fn range_args(args: &[JsValue]) -> (Vec<RangeArg>, bool) {
    let mut out: Vec<RangeArg> = args
        .iter()
        .filter_map(|value| {
            if let Some(n) = value.as_number() {
                return Some(RangeArg::Number(n as i64));
            }
            let text = value.as_string()?.to_std_string_escaped();
            Some(match text.trim().parse::<i64>() {
                Ok(n) => RangeArg::Number(n),
                Err(_) => RangeArg::Text(text),
            })
        })
        .collect();

    let gmt = matches!(out.last(), Some(RangeArg::Text(t)) if t.eq_ignore_ascii_case("GMT"));
    if gmt {
        out.pop();
    }
    (out, gmt)
}

fn now(gmt: bool) -> NaiveDateTime {
    if gmt {
        Utc::now().naive_utc()
    } else {
        Local::now().naive_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use std::net::IpAddr;

    fn environment() -> ScriptEnvironment {
        let resolver = StaticResolver::new()
            .with_host("intranet.example.com", [IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))])
            .with_local([IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42))]);
        ScriptEnvironment::builder().resolver(resolver).build().unwrap()
    }

    fn eval(context: &mut Context, code: &str) -> JsValue {
        context.eval(Source::from_bytes(code)).unwrap()
    }

    fn eval_bool(context: &mut Context, code: &str) -> bool {
        eval(context, code).as_boolean().unwrap()
    }

    fn eval_string(context: &mut Context, code: &str) -> Option<String> {
        eval(context, code)
            .as_string()
            .map(JsString::to_std_string_escaped)
    }

    #[test]
    fn test_host_functions() {
        let mut ctx = environment().new_context().unwrap();
        assert_eq!(
            eval_string(&mut ctx, "dnsResolve('intranet.example.com')").as_deref(),
            Some("10.1.2.3")
        );
        assert!(eval(&mut ctx, "dnsResolve('nowhere.invalid')").is_null());
        assert!(eval(&mut ctx, "dnsResolveEx('nowhere.invalid')").is_null());
        assert_eq!(
            eval_string(&mut ctx, "myIpAddress()").as_deref(),
            Some("192.168.1.42")
        );
        assert_eq!(
            eval_string(&mut ctx, "myIpAddressEx()").as_deref(),
            Some("192.168.1.42")
        );
    }

    #[test]
    fn test_resolver_outlives_environment_and_collection() {
        let mut ctx = environment().new_context().unwrap();
        boa_gc::force_collect();
        assert_eq!(
            eval_string(&mut ctx, "dnsResolve('intranet.example.com')").as_deref(),
            Some("10.1.2.3")
        );
        assert!(eval_bool(&mut ctx, "isInNet('intranet.example.com', '10.0.0.0', '255.0.0.0')"));
    }

    #[test]
    fn test_predicates_are_installed() {
        let mut ctx = environment().new_context().unwrap();
        assert!(eval_bool(&mut ctx, "isPlainHostName('www')"));
        assert!(eval_bool(&mut ctx, "dnsDomainIs('www.netscape.com', '.netscape.com')"));
        assert!(eval_bool(&mut ctx, "localHostOrDomainIs('www', 'www.netscape.com')"));
        assert!(eval_bool(&mut ctx, "shExpMatch('proxy1.corp', 'proxy?.corp')"));
        assert!(eval_bool(&mut ctx, "dnsDomainLevels('a.b.c') === 2"));
        assert!(eval_bool(&mut ctx, "isInNet('intranet.example.com', '10.0.0.0', '255.0.0.0')"));
        assert!(!eval_bool(&mut ctx, "isInNet(dnsResolve('nowhere.invalid'), '10.0.0.0', '255.0.0.0')"));
        assert!(eval_bool(&mut ctx, "isInNetEx('10.1.2.3', '10.1.0.0/16')"));
        assert!(eval_bool(&mut ctx, "isResolvable('intranet.example.com')"));
        assert!(!eval_bool(&mut ctx, "isResolvable('nowhere.invalid')"));
        assert!(eval_bool(&mut ctx, "isResolvableEx('intranet.example.com')"));
        assert!(eval_bool(&mut ctx, "convert_addr('104.16.41.2') === 1745889538"));
        assert_eq!(
            eval_string(&mut ctx, "sortIpAddressList('10.2.0.1;10.1.0.1')").as_deref(),
            Some("10.1.0.1;10.2.0.1")
        );
        assert!(!eval_bool(&mut ctx, "sortIpAddressList('junk')"));
        assert!(eval_bool(&mut ctx, "typeof weekdayRange('MON', 'SUN') === 'boolean'"));
        assert!(eval_bool(&mut ctx, "dateRange(1, 31)"));
        assert!(eval_bool(&mut ctx, "timeRange(0, 0, 0, 23, 59, 59, 'GMT')"));
        assert_eq!(eval_string(&mut ctx, "getClientVersion()").as_deref(), Some("1.0"));
        assert!(eval(&mut ctx, "alert('hello from PAC')").is_undefined());
    }

    #[test]
    fn test_contexts_are_isolated() {
        let env = environment();
        let mut first = env.new_context().unwrap();
        let mut second = env.new_context().unwrap();

        eval(
            &mut first,
            "function FindProxyForURL(url, host) { return 'DIRECT'; } dnsResolve = null;",
        );

        assert_eq!(
            eval_string(&mut second, "typeof FindProxyForURL").as_deref(),
            Some("undefined")
        );
        assert_eq!(
            eval_string(&mut second, "typeof dnsResolve").as_deref(),
            Some("function")
        );
    }

    #[test]
    fn test_broken_prelude_is_fatal() {
        let err = ScriptEnvironment::builder()
            .resolver(StaticResolver::new())
            .prelude("function broken( {")
            .build()
            .unwrap_err();
        assert!(matches!(err, PacError::Environment(_)));
    }

    #[test]
    fn test_global_is_shared() {
        let a = ScriptEnvironment::global().unwrap();
        let b = ScriptEnvironment::global().unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_range_args_strip_gmt() {
        let (args, gmt) = range_args(&[
            JsValue::from(9),
            JsValue::from(JsString::from("17")),
            JsValue::from(JsString::from("gmt")),
        ]);
        assert!(gmt);
        assert_eq!(args, vec![RangeArg::Number(9), RangeArg::Number(17)]);
    }
}
