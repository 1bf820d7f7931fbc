// src/core/modules/recon.rs

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::CheckModule;
use crate::core::errors::ProbeError;
use crate::core::models::Finding;
use crate::core::probe::{Probe, ProbeContext, probe};
use crate::core::transport::{HttpResponse, PortState};

pub const CATEGORIES: &[&str] = &["open_ports", "subdomains", "technologies", "info_disclosure"];

const SUBDOMAIN_PREFIXES: &[&str] = &["www", "mail", "ftp", "admin", "blog", "dev", "test", "api"];

/// (marker, description) pairs searched for in the lowercased landing page.
const DISCLOSURE_MARKERS: &[(&str, &str)] = &[
    ("error", "Error messages"),
    ("stack trace", "Stack traces"),
    ("debug", "Debug information"),
    ("version", "Version information"),
];

/// Reconnaissance: exposed services, sibling hosts and the software stack.
pub struct ReconModule {
    ctx: Arc<ProbeContext>,
}

impl ReconModule {
    pub fn new(ctx: Arc<ProbeContext>) -> Self {
        Self { ctx }
    }

    pub fn boxed(ctx: Arc<ProbeContext>) -> Box<dyn CheckModule> {
        Box::new(Self::new(ctx))
    }
}

impl CheckModule for ReconModule {
    fn identifier(&self) -> &'static str {
        "recon"
    }

    fn probes(&self) -> Vec<Arc<dyn Probe>> {
        vec![
            probe("open_ports", &self.ctx, scan_ports),
            probe("subdomains", &self.ctx, find_subdomains),
            probe("technologies", &self.ctx, detect_technologies),
            probe("info_disclosure", &self.ctx, check_info_disclosure),
        ]
    }
}

// --- Port sweep ---

async fn scan_ports(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    let host = ctx.host()?;
    info!(host = %host, "Starting port scan.");

    let statuses = match ctx.transport().scan(&host, &ctx.config().ports).await {
        Ok(statuses) => statuses,
        Err(e) => {
            warn!(host = %host, error = %e, "Port scan failed.");
            return Ok(Vec::new());
        }
    };

    let findings: Vec<Finding> = statuses
        .into_iter()
        .filter(|s| s.state == PortState::Open)
        .map(|s| {
            Finding::new(
                "open_ports",
                "Open port",
                format!("{}/{} ({}) is {}", s.port, s.protocol, s.service, s.state),
            )
        })
        .collect();
    info!(open = findings.len(), "Port scan finished.");
    Ok(findings)
}

// --- Subdomain enumeration ---

async fn find_subdomains(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    let domain = ctx.host()?;
    info!(domain = %domain, "Enumerating subdomains.");

    // Lookups run concurrently; results are put back in prefix order.
    let mut lookups = JoinSet::new();
    for (index, prefix) in SUBDOMAIN_PREFIXES.iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        let subdomain = format!("{}.{}", prefix, domain);
        lookups.spawn(async move {
            let addresses = ctx.transport().resolve(&subdomain).await;
            (index, subdomain, addresses)
        });
    }

    let mut resolved = Vec::new();
    while let Some(joined) = lookups.join_next().await {
        match joined {
            Ok((index, subdomain, Ok(addresses))) if !addresses.is_empty() => {
                debug!(subdomain = %subdomain, count = addresses.len(), "Subdomain resolved.");
                resolved.push((index, subdomain, addresses));
            }
            Ok((_, subdomain, Ok(_))) => debug!(subdomain = %subdomain, "No addresses."),
            Ok((_, subdomain, Err(e))) => debug!(subdomain = %subdomain, error = %e, "Lookup failed."),
            Err(e) => warn!(error = %e, "Subdomain lookup task failed."),
        }
    }
    resolved.sort_by_key(|(index, _, _)| *index);

    Ok(resolved
        .into_iter()
        .map(|(_, subdomain, addresses)| {
            let addresses: Vec<String> = addresses.iter().map(ToString::to_string).collect();
            Finding::new(
                "subdomains",
                "Subdomain resolved",
                format!("{} -> {}", subdomain, addresses.join(", ")),
            )
        })
        .collect())
}

// --- Technology fingerprinting ---

/// Where a fingerprint rule looks for its pattern.
///
/// The regex's first capture group, when present and non-empty, is taken as
/// the detected version.
enum Check<'a> {
    /// A response header, looked up by lowercase name.
    Header(&'a str, &'a Lazy<Regex>),
    /// The `content` of a `<meta name="...">` tag.
    MetaTag(&'a str, &'a Lazy<Regex>),
    /// The raw response body.
    Body(&'a Lazy<Regex>),
    /// The `src` of any `<script>` tag.
    ScriptSrc(&'a Lazy<Regex>),
    /// All `Set-Cookie` values joined together.
    Cookie(&'a Lazy<Regex>),
}

/// Maps one observable pattern to a technology and its category.
///
/// Several rules may name the same technology; the first match is kept and a
/// later match only fills in a missing version.
struct FingerprintRule<'a> {
    tech_name: &'a str,
    category: &'a str,
    check: Check<'a>,
}

static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"nginx(?:/([\d\.]+))?").unwrap());
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache(?:/([\d\.]+))?").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Microsoft-IIS/([\d\.]+)").unwrap());
static RE_CLOUDFLARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"cloudflare").unwrap());
static RE_PHP: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHP/([\d\.]+)").unwrap());
static RE_PHPSESSID: Lazy<Regex> = Lazy::new(|| Regex::new(r"PHPSESSID").unwrap());
static RE_EXPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Express").unwrap());
static RE_ASPNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"ASP\.NET").unwrap());
static RE_JSESSIONID: Lazy<Regex> = Lazy::new(|| Regex::new(r"JSESSIONID").unwrap());
static RE_DJANGO_CSRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"csrftoken").unwrap());
static RE_RAILS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_rails_session").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ?([\d\.]+)?").unwrap());
static RE_WP_CONTENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_NEXTJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_JQUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"jquery[-.]?([\d\.]+\d)?(?:\.min)?\.js").unwrap());
static RE_REACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"react-dom|data-reactroot").unwrap());

static RULES: &[FingerprintRule] = &[
    FingerprintRule { tech_name: "Nginx", category: "Web Server", check: Check::Header("server", &RE_NGINX) },
    FingerprintRule { tech_name: "Apache", category: "Web Server", check: Check::Header("server", &RE_APACHE) },
    FingerprintRule { tech_name: "IIS", category: "Web Server", check: Check::Header("server", &RE_IIS) },
    FingerprintRule { tech_name: "Cloudflare", category: "CDN / WAF", check: Check::Header("server", &RE_CLOUDFLARE) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Header("x-powered-by", &RE_PHP) },
    FingerprintRule { tech_name: "PHP", category: "Language", check: Check::Cookie(&RE_PHPSESSID) },
    FingerprintRule { tech_name: "Express", category: "Framework", check: Check::Header("x-powered-by", &RE_EXPRESS) },
    FingerprintRule { tech_name: "ASP.NET", category: "Framework", check: Check::Header("x-powered-by", &RE_ASPNET) },
    FingerprintRule { tech_name: "Java", category: "Language", check: Check::Cookie(&RE_JSESSIONID) },
    FingerprintRule { tech_name: "Python/Django", category: "Framework", check: Check::Cookie(&RE_DJANGO_CSRF) },
    FingerprintRule { tech_name: "Ruby on Rails", category: "Framework", check: Check::Cookie(&RE_RAILS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::MetaTag("generator", &RE_WORDPRESS) },
    FingerprintRule { tech_name: "WordPress", category: "CMS", check: Check::Body(&RE_WP_CONTENT) },
    FingerprintRule { tech_name: "Next.js", category: "JS Framework", check: Check::ScriptSrc(&RE_NEXTJS) },
    FingerprintRule { tech_name: "jQuery", category: "JS Library", check: Check::ScriptSrc(&RE_JQUERY) },
    FingerprintRule { tech_name: "React", category: "JS Library", check: Check::Body(&RE_REACT) },
];

/// A detected technology, reported as "name version" under its category.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Technology {
    name: String,
    category: String,
    version: Option<String>,
}

/// Applies every rule to a response. Technologies keep the order of the
/// first rule that detected them.
fn fingerprint(response: &HttpResponse) -> Vec<Technology> {
    let cookies = response.set_cookies().join("; ");
    let document = Html::parse_document(&response.body);
    let mut found: Vec<Technology> = Vec::new();

    for rule in RULES {
        let version = match &rule.check {
            Check::Header(name, re) => check_with_regex(response.header(name), re),
            Check::MetaTag(name, re) => check_meta_tag(&document, name, re),
            Check::Body(re) => check_with_regex(Some(&response.body), re),
            Check::ScriptSrc(re) => check_script_src(&document, re),
            Check::Cookie(re) => check_with_regex(Some(&cookies), re),
        };

        let Some(version) = version else { continue };
        debug!(tech = rule.tech_name, version = ?version, "Rule matched.");
        match found.iter_mut().find(|t| t.name == rule.tech_name) {
            Some(existing) => {
                if existing.version.is_none() && version.is_some() {
                    existing.version = version;
                }
            }
            None => found.push(Technology {
                name: rule.tech_name.to_string(),
                category: rule.category.to_string(),
                version,
            }),
        }
    }
    found
}

/// `Some(version)` if the pattern matched, where `version` is the first
/// capture group when present and non-empty.
fn check_with_regex(text: Option<&str>, re: &Regex) -> Option<Option<String>> {
    text.and_then(|text| {
        re.captures(text).map(|caps| {
            caps.get(1)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        })
    })
}

/// Matches the `content` attribute of the first `<meta name="{name}">` tag.
fn check_meta_tag(doc: &Html, name: &str, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse(&format!("meta[name='{}']", name)).ok()?;
    let content = doc.select(&selector).next().and_then(|el| el.value().attr("content"));
    check_with_regex(content, re)
}

/// First `<script src>` matching the pattern.
fn check_script_src(doc: &Html, re: &Regex) -> Option<Option<String>> {
    let selector = Selector::parse("script[src]").ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| check_with_regex(Some(src), re))
}

async fn detect_technologies(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Starting technology detection.");
    let response = match ctx.get(ctx.base_url()?).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Landing page request failed.");
            return Ok(Vec::new());
        }
    };

    let mut findings: Vec<Finding> = fingerprint(&response)
        .into_iter()
        .map(|tech| {
            let details = match &tech.version {
                Some(version) => format!("{} {}", tech.name, version),
                None => tech.name.clone(),
            };
            Finding::new("technologies", &tech.category, details)
        })
        .collect();

    // Raw banner headers are disclosures in their own right.
    for (header, description) in [("server", "Server header"), ("x-powered-by", "X-Powered-By header")] {
        if let Some(value) = response.header(header) {
            findings.push(Finding::new("technologies", description, value));
        }
    }

    info!(count = findings.len(), "Technology detection finished.");
    Ok(findings)
}

// --- Information disclosure ---

async fn check_info_disclosure(ctx: Arc<ProbeContext>) -> Result<Vec<Finding>, ProbeError> {
    info!(target = ctx.target(), "Checking for information disclosure.");
    let response = match ctx.get(ctx.base_url()?).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Landing page request failed.");
            return Ok(Vec::new());
        }
    };

    let body = response.body.to_lowercase();
    Ok(DISCLOSURE_MARKERS
        .iter()
        .filter(|(marker, _)| body.contains(marker))
        .map(|(marker, description)| {
            Finding::new("info_disclosure", description, format!("Found {} in response", marker))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(headers: &[(&'static str, &'static str)], body: &str) -> HttpResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        HttpResponse { status: 200, headers: map, body: body.to_string() }
    }

    #[test]
    fn fingerprint_reads_headers_cookies_and_markup() {
        let page = r#"<html><head><meta name="generator" content="WordPress 6.4.2">
            <script src="/js/jquery-3.7.1.min.js"></script></head>
            <body><img src="/wp-content/uploads/a.png"></body></html>"#;
        let res = response(
            &[
                ("server", "nginx/1.25.3"),
                ("x-powered-by", "PHP/8.2.1"),
                ("set-cookie", "PHPSESSID=abc; path=/"),
            ],
            page,
        );

        let techs = fingerprint(&res);
        let names: Vec<_> = techs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Nginx", "PHP", "WordPress", "jQuery"]);
        assert_eq!(techs[0].version.as_deref(), Some("1.25.3"));
        assert_eq!(techs[1].version.as_deref(), Some("8.2.1"));
        assert_eq!(techs[2].version.as_deref(), Some("6.4.2"));
        assert_eq!(techs[3].version.as_deref(), Some("3.7.1"));
    }

    #[test]
    fn rules_naming_one_technology_yield_one_entry() {
        let res = response(
            &[
                ("server", "Apache"),
                ("x-powered-by", "PHP/8.1.0"),
                ("set-cookie", "PHPSESSID=abc; path=/"),
            ],
            "",
        );

        let techs = fingerprint(&res);
        assert_eq!(techs.len(), 2);
        assert_eq!(techs[0].name, "Apache");
        assert_eq!(techs[0].version, None);
        assert_eq!(techs[1].name, "PHP");
        assert_eq!(techs[1].version.as_deref(), Some("8.1.0"));
    }

    #[test]
    fn plain_page_has_no_fingerprint() {
        assert!(fingerprint(&response(&[], "<html><body>hello</body></html>")).is_empty());
    }
}
