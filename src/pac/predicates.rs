// src/pac/predicates.rs
//! The standard PAC helper predicates, independent of the script engine.

use chrono::{Datelike, NaiveDateTime, Timelike};
use ipnet::IpNet;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr};

pub fn is_plain_host_name(host: &str) -> bool {
    !host.contains('.')
}

pub fn dns_domain_is(host: &str, domain: &str) -> bool {
    host.len() >= domain.len()
        && host.as_bytes()[host.len() - domain.len()..].eq_ignore_ascii_case(domain.as_bytes())
}

/// Exact match, or an unqualified `host` matching the first label of `hostdom`.
pub fn local_host_or_domain_is(host: &str, hostdom: &str) -> bool {
    host.eq_ignore_ascii_case(hostdom)
        || (is_plain_host_name(host)
            && hostdom.len() > host.len()
            && hostdom.as_bytes()[host.len()] == b'.'
            && hostdom.as_bytes()[..host.len()].eq_ignore_ascii_case(host.as_bytes()))
}

pub fn dns_domain_levels(host: &str) -> usize {
    host.matches('.').count()
}

/// Shell glob match: `*` matches any run, `?` one character.
pub fn sh_exp_match(value: &str, pattern: &str) -> bool {
    let mut regex_pattern = String::with_capacity(pattern.len() + 8);
    regex_pattern.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex_pattern.push_str(".*"),
            '?' => regex_pattern.push('.'),
            other => regex_pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex_pattern.push('$');

    Regex::new(&regex_pattern)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// `isInNet` on an already resolved IPv4 address.
pub fn is_in_net(ip: &str, pattern: &str, mask: &str) -> bool {
    let parsed = (
        ip.parse::<Ipv4Addr>(),
        pattern.parse::<Ipv4Addr>(),
        mask.parse::<Ipv4Addr>(),
    );
    match parsed {
        (Ok(ip), Ok(net), Ok(mask)) => {
            let mask = u32::from(mask);
            (u32::from(ip) & mask) == (u32::from(net) & mask)
        }
        _ => false,
    }
}

/// `isInNetEx` with a CIDR prefix such as `198.95.0.0/16` or `3ffe:8311:ffff::/48`.
pub fn is_in_net_ex(ip: &str, prefix: &str) -> bool {
    match (ip.parse::<IpAddr>(), prefix.parse::<IpNet>()) {
        (Ok(ip), Ok(net)) => net.contains(&ip),
        _ => false,
    }
}

/// Sorts a `;` separated address list, IPv6 first. `None` if any entry is not an address.
pub fn sort_ip_address_list(list: &str) -> Option<String> {
    let mut addrs = list
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<IpAddr>().ok())
        .collect::<Option<Vec<_>>>()?;
    if addrs.is_empty() {
        return None;
    }

    addrs.sort_by_key(|ip| (ip.is_ipv4(), *ip));
    Some(
        addrs
            .iter()
            .map(IpAddr::to_string)
            .collect::<Vec<_>>()
            .join(";"),
    )
}

/// One argument of a date/time predicate, after the trailing `"GMT"` is removed.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeArg {
    Number(i64),
    Text(String),
}

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

fn weekday_index(name: &str) -> Option<u32> {
    WEEKDAYS
        .iter()
        .position(|d| d.eq_ignore_ascii_case(name))
        .map(|i| i as u32)
}

fn month_index(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

fn in_range<T: PartialOrd>(value: T, start: T, end: T) -> bool {
    if start <= end {
        start <= value && value <= end
    } else {
        value >= start || value <= end
    }
}

pub fn weekday_range(now: NaiveDateTime, args: &[RangeArg]) -> bool {
    let day = |arg: &RangeArg| match arg {
        RangeArg::Text(s) => weekday_index(s),
        RangeArg::Number(_) => None,
    };
    let today = now.weekday().num_days_from_sunday();

    match args {
        [wd] => day(wd) == Some(today),
        [wd1, wd2] => match (day(wd1), day(wd2)) {
            (Some(start), Some(end)) => in_range(today, start, end),
            _ => false,
        },
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DateSpec {
    year: Option<i64>,
    month: Option<u32>,
    day: Option<u32>,
}

fn date_spec(args: &[RangeArg]) -> Option<DateSpec> {
    let mut spec = DateSpec::default();
    for arg in args {
        match arg {
            RangeArg::Number(n) if (1..=31).contains(n) && spec.day.is_none() => {
                spec.day = Some(*n as u32)
            }
            RangeArg::Number(n) if *n > 31 && spec.year.is_none() => spec.year = Some(*n),
            RangeArg::Text(s) if spec.month.is_none() => spec.month = Some(month_index(s)?),
            _ => return None,
        }
    }
    Some(spec)
}

/// Projects `now` onto the fields present in `spec`, most significant first.
fn date_key(spec: &DateSpec, now: NaiveDateTime) -> Vec<i64> {
    let mut key = Vec::with_capacity(3);
    if spec.year.is_some() {
        key.push(i64::from(now.year()));
    }
    if spec.month.is_some() {
        key.push(i64::from(now.month()));
    }
    if spec.day.is_some() {
        key.push(i64::from(now.day()));
    }
    key
}

fn spec_key(spec: &DateSpec) -> Vec<i64> {
    [spec.year, spec.month.map(i64::from), spec.day.map(i64::from)]
        .into_iter()
        .flatten()
        .collect()
}

pub fn date_range(now: NaiveDateTime, args: &[RangeArg]) -> bool {
    match args.len() {
        1 => date_spec(args).is_some_and(|spec| spec_key(&spec) == date_key(&spec, now)),
        2 | 4 | 6 => {
            let (first, second) = args.split_at(args.len() / 2);
            match (date_spec(first), date_spec(second)) {
                (Some(start), Some(end)) => {
                    // Both halves must name the same fields.
                    let same_shape = start.year.is_some() == end.year.is_some()
                        && start.month.is_some() == end.month.is_some()
                        && start.day.is_some() == end.day.is_some();
                    same_shape && in_range(date_key(&start, now), spec_key(&start), spec_key(&end))
                }
                _ => false,
            }
        }
        _ => false,
    }
}

pub fn time_range(now: NaiveDateTime, args: &[RangeArg]) -> bool {
    let numbers: Option<Vec<i64>> = args
        .iter()
        .map(|arg| match arg {
            RangeArg::Number(n) => Some(*n),
            RangeArg::Text(_) => None,
        })
        .collect();
    let Some(numbers) = numbers else {
        return false;
    };

    let secs = |h: i64, m: i64, s: i64| h * 3600 + m * 60 + s;
    let current = secs(
        i64::from(now.hour()),
        i64::from(now.minute()),
        i64::from(now.second()),
    );

    match numbers.as_slice() {
        [hour] => i64::from(now.hour()) == *hour,
        [h1, h2] => in_range(current, secs(*h1, 0, 0), secs(*h2, 0, 0)),
        [h1, m1, h2, m2] => in_range(current, secs(*h1, *m1, 0), secs(*h2, *m2, 0)),
        [h1, m1, s1, h2, m2, s2] => in_range(current, secs(*h1, *m1, *s1), secs(*h2, *m2, *s2)),
        _ => false,
    }
}
