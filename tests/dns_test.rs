//! DNS Module Tests
//!
//! Covers:
//! - hosts text parsing
//! - `DnsOverrideResolver` stage ordering using mock DoH/system resolvers
//! - live snapshot swaps
//! - `GaiResolver` on IP literals

use mirrornet::base::neterror::NetError;
use mirrornet::dns::{
    should_use_doh, Addrs, DnsOverrideConfig, DnsOverrideResolver, GaiResolver, HostOverrideTable,
    Name, Resolve, ResolveSource, Resolving,
};

use arc_swap::ArcSwap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct MockResolver {
    response: Result<Vec<IpAddr>, NetError>,
    calls: AtomicUsize,
}

impl MockResolver {
    fn answering(ips: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(ips.iter().map(|s| s.parse().unwrap()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(error: NetError) -> Arc<Self> {
        Arc::new(Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolve for MockResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.clone();
        Box::pin(async move {
            response.map(|ips| Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0))) as Addrs)
        })
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn build(
    override_enabled: bool,
    doh_enabled: bool,
    hosts: &str,
    doh: Arc<MockResolver>,
    system: Arc<MockResolver>,
) -> DnsOverrideResolver {
    let cfg = DnsOverrideConfig {
        override_enabled,
        doh_enabled,
        table: HostOverrideTable::parse(hosts),
    };
    DnsOverrideResolver::new(Arc::new(ArcSwap::from_pointee(cfg)), doh, system)
}

#[test]
fn test_hosts_text_accumulates_per_host() {
    let table =
        HostOverrideTable::parse("1.2.3.4 example.com\n5.6.7.8 example.com\n9.9.9.9 www.example.com");

    assert_eq!(table.len(), 2);
    assert_eq!(table.get("example.com"), Some(&[ip("1.2.3.4"), ip("5.6.7.8")][..]));
    assert_eq!(table.get("www.example.com"), Some(&[ip("9.9.9.9")][..]));
}

#[test]
fn test_hosts_text_skips_garbage() {
    let table = HostOverrideTable::parse(
        "# comment\n\n   \nnot-an-ip host.com\n1.2.3.4\n1.2.3.4 ok.com trailing words\n::1 v6.com",
    );

    assert_eq!(table.len(), 2);
    assert_eq!(table.get("ok.com"), Some(&[ip("1.2.3.4")][..]));
    assert_eq!(table.get("v6.com"), Some(&[ip("::1")][..]));
    assert!(table.get("host.com").is_none());
}

#[tokio::test]
async fn test_scenario_hosts_resolution() {
    let doh = MockResolver::answering(&["7.7.7.7"]);
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(
        true,
        true,
        "1.2.3.4 example.com\n5.6.7.8 example.com\n9.9.9.9 www.example.com",
        doh.clone(),
        system.clone(),
    );

    assert_eq!(
        resolver.lookup("example.com").await.unwrap(),
        vec![ip("1.2.3.4"), ip("5.6.7.8")]
    );
    assert_eq!(resolver.lookup("www.example.com").await.unwrap(), vec![ip("9.9.9.9")]);
    assert_eq!(doh.calls(), 0);
    assert_eq!(system.calls(), 0);
}

#[tokio::test]
async fn test_suffix_match_respects_dot_boundary() {
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(
        true,
        false,
        "1.2.3.4 example.com",
        MockResolver::answering(&[]),
        system.clone(),
    );

    let (addrs, source) = resolver.lookup_with_source("cdn.example.com").await.unwrap();
    assert_eq!(addrs, vec![ip("1.2.3.4")]);
    assert_eq!(source, ResolveSource::Suffix);

    // "badexample.com" is not under "example.com"
    let (addrs, source) = resolver.lookup_with_source("badexample.com").await.unwrap();
    assert_eq!(addrs, vec![ip("8.8.8.8")]);
    assert_eq!(source, ResolveSource::System);
}

#[tokio::test]
async fn test_override_disabled_skips_table() {
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(
        false,
        false,
        "1.2.3.4 example.com",
        MockResolver::answering(&[]),
        system.clone(),
    );

    assert_eq!(resolver.lookup("example.com").await.unwrap(), vec![ip("8.8.8.8")]);
    assert_eq!(system.calls(), 1);
}

#[tokio::test]
async fn test_doh_only_for_allow_listed_hosts() {
    let doh = MockResolver::answering(&["7.7.7.7"]);
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(false, true, "", doh.clone(), system.clone());

    let (addrs, source) = resolver.lookup_with_source("www.dlsite.com").await.unwrap();
    assert_eq!(addrs, vec![ip("7.7.7.7")]);
    assert_eq!(source, ResolveSource::Doh);

    let (_, source) = resolver.lookup_with_source("example.org").await.unwrap();
    assert_eq!(source, ResolveSource::System);

    assert_eq!(doh.calls(), 1);
    assert_eq!(system.calls(), 1);
}

#[tokio::test]
async fn test_doh_failure_falls_through() {
    let doh = MockResolver::failing(NetError::NameResolutionFailed);
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(false, true, "", doh.clone(), system.clone());

    let (addrs, source) = resolver.lookup_with_source("play.chobit.cc").await.unwrap();
    assert_eq!(addrs, vec![ip("8.8.8.8")]);
    assert_eq!(source, ResolveSource::System);
    assert_eq!(doh.calls(), 1);
}

#[tokio::test]
async fn test_doh_empty_answer_falls_through() {
    let doh = MockResolver::answering(&[]);
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(false, true, "", doh, system.clone());

    assert_eq!(resolver.lookup("www.dlsite.com").await.unwrap(), vec![ip("8.8.8.8")]);
    assert_eq!(system.calls(), 1);
}

#[tokio::test]
async fn test_system_failure_is_propagated() {
    let resolver = build(
        false,
        false,
        "",
        MockResolver::answering(&[]),
        MockResolver::failing(NetError::NameNotResolved),
    );

    let err = resolver.lookup("example.org").await.unwrap_err();
    assert!(matches!(err, NetError::NameNotResolved));
}

#[tokio::test]
async fn test_answers_are_ipv4_first() {
    let resolver = build(
        true,
        false,
        "::1 dual.test\n1.1.1.1 dual.test\n2001:db8::1 dual.test\n2.2.2.2 dual.test",
        MockResolver::answering(&[]),
        MockResolver::answering(&[]),
    );

    let addrs = resolver.lookup("dual.test").await.unwrap();
    assert_eq!(
        addrs,
        vec![ip("1.1.1.1"), ip("2.2.2.2"), ip("::1"), ip("2001:db8::1")]
    );
}

#[tokio::test]
async fn test_snapshot_swap_takes_effect() {
    let system = MockResolver::answering(&["8.8.8.8"]);
    let resolver = build(false, false, "1.2.3.4 example.com", MockResolver::answering(&[]), system);

    assert_eq!(resolver.lookup("example.com").await.unwrap(), vec![ip("8.8.8.8")]);

    let mut cfg = (*resolver.snapshot()).clone();
    cfg.override_enabled = true;
    resolver.store(cfg);

    assert_eq!(resolver.lookup("example.com").await.unwrap(), vec![ip("1.2.3.4")]);
}

#[tokio::test]
async fn test_resolver_trait_yields_socket_addrs() {
    let resolver = build(
        true,
        false,
        "1.2.3.4 example.com",
        MockResolver::answering(&[]),
        MockResolver::answering(&[]),
    );

    let addrs: Vec<_> = resolver.resolve(Name::new("example.com")).await.unwrap().collect();
    assert_eq!(addrs, vec![SocketAddr::new(ip("1.2.3.4"), 0)]);
}

#[test]
fn test_doh_allow_list() {
    assert!(should_use_doh("dlsite.com"));
    assert!(should_use_doh("play.dlsite.com"));
    assert!(should_use_doh("api.chobit.cc"));
    assert!(!should_use_doh("notdlsite.com"));
    assert!(!should_use_doh("example.com"));
}

#[tokio::test]
async fn test_gai_resolver_ip_literal() {
    let resolver = GaiResolver::new();
    let addrs: Vec<_> = resolver.resolve(Name::new("127.0.0.1")).await.unwrap().collect();
    assert!(!addrs.is_empty());
    assert_eq!(addrs[0].ip(), ip("127.0.0.1"));
}
